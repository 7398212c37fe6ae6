// tests/scheduler_cycle.rs
//
// End-to-end cycles through the engine facade with in-memory settings and
// content and the recording remote mock.
//
// Covered:
// - at most one send per (language, frequency) per day
// - empty selection leaves the stamp alone and retries
// - failed dispatch clears the stamp
// - batch mode lifts the time-of-day gate for later languages
// - stop vs continue failure policies
// - preview and unconfigured runs
// - a broken template fails only its own language
// - minimum-entries backfill honours category exclusion
// - weekly cadence waits for its target weekday

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use mdirector_newsletter::config::{MemorySettingsStore, Settings};
use mdirector_newsletter::content::{
    ContentStatus, DeliveryOverrides, InMemoryContentRepository, RawContent,
};
use mdirector_newsletter::error::DispatchError;
use mdirector_newsletter::remote::MockDeliveryApi;
use mdirector_newsletter::render::{SiteInfo, TemplateCatalog, TemplateRenderer};
use mdirector_newsletter::scheduler::{CycleOutcome, FailurePolicy, RunOptions, SkipReason};
use mdirector_newsletter::{Frequency, NewsletterEngine};

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn post(id: u64, lang: &str, published_at: NaiveDateTime) -> RawContent {
    RawContent {
        id,
        title: format!("Post {id}"),
        body: format!("<p>Body of post {id}</p>"),
        excerpt: None,
        published_at,
        permalink: format!("https://blog.test/{id}"),
        lead_image: None,
        language: Some(lang.to_string()),
        status: ContentStatus::Publish,
        kind: "post".into(),
        category_ids: vec![],
        taxonomies: vec![],
        overrides: DeliveryOverrides::default(),
    }
}

fn configured() -> Settings {
    Settings::from_json(json!({
        "mdirector_api": "key",
        "mdirector_secret": "secret",
        "mdirector_frequency_daily": "yes",
        "mdirector_hour_daily": "09:00",
        "mdirector_daily_list_es": [5],
        "mdirector_daily_list_en": [6],
    }))
    .unwrap()
}

struct Harness {
    engine: NewsletterEngine,
    store: MemorySettingsStore,
    content: InMemoryContentRepository,
    api: MockDeliveryApi,
}

fn harness(
    settings: Settings,
    languages: &[&str],
    items: Vec<RawContent>,
    policy: FailurePolicy,
) -> Harness {
    harness_with_templates(Vec::new(), settings, languages, items, policy)
}

/// `custom` roots are searched before the bundled templates.
fn harness_with_templates(
    custom: Vec<PathBuf>,
    settings: Settings,
    languages: &[&str],
    items: Vec<RawContent>,
    policy: FailurePolicy,
) -> Harness {
    let store = MemorySettingsStore::new(settings);
    let content = InMemoryContentRepository::new(
        languages.iter().map(|l| l.to_string()).collect(),
        items,
    );
    let api = MockDeliveryApi::new();
    let mut roots = custom;
    roots.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates"));
    let renderer = TemplateRenderer::new(
        TemplateCatalog::new(roots),
        SiteInfo {
            name: "Test Blog".into(),
            url: "https://blog.test".into(),
            templates_url: "https://blog.test/templates".into(),
        },
    );
    let engine = NewsletterEngine::new(
        Arc::new(store.clone()),
        Arc::new(content.clone()),
        renderer,
        Arc::new(api.clone()),
        policy,
    );
    Harness {
        engine,
        store,
        content,
        api,
    }
}

fn outcome_for<'a>(
    report: &'a mdirector_newsletter::CycleReport,
    lang: &str,
) -> &'a CycleOutcome {
    &report
        .languages
        .iter()
        .find(|r| r.language == lang)
        .unwrap_or_else(|| panic!("no report for {lang}"))
        .outcome
}

#[tokio::test]
async fn sends_at_most_once_per_day() {
    let h = harness(
        configured(),
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );

    let first = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&first, "es"), CycleOutcome::Sent { items: 1, .. }));
    assert_eq!(
        h.store.snapshot().raw_str("mdirector_daily_sent_es"),
        Some("2024-03-15 10:00")
    );

    for minute in [5, 30, 59] {
        let again = h
            .engine
            .run_frequency(Frequency::Daily, at(15, 11, minute), &RunOptions::scheduled())
            .await;
        assert_eq!(
            outcome_for(&again, "es"),
            &CycleOutcome::Skipped {
                reason: SkipReason::AlreadySentToday
            }
        );
    }
    assert_eq!(h.api.envelope_count(), 1);
    assert_eq!(h.api.trigger_count(), 1);
}

#[tokio::test]
async fn operator_resend_bypasses_the_daily_guard() {
    let h = harness(
        configured(),
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    h.engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    let resend = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 30), &RunOptions::manual())
        .await;
    assert!(matches!(outcome_for(&resend, "es"), CycleOutcome::Sent { .. }));
    assert_eq!(h.api.envelope_count(), 2);
}

#[tokio::test]
async fn empty_selection_keeps_stamp_and_retries_same_day() {
    let h = harness(configured(), &["es"], vec![], FailurePolicy::default());

    let empty = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(outcome_for(&empty, "es"), &CycleOutcome::NoContent);
    assert_eq!(h.store.snapshot().get("mdirector_daily_sent_es"), None);
    assert_eq!(h.api.envelope_count(), 0);

    h.content.insert(post(7, "es", at(15, 8, 30)));
    let retry = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 30), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&retry, "es"), CycleOutcome::Sent { .. }));
    assert_eq!(h.api.envelope_count(), 1);
}

#[tokio::test]
async fn failed_dispatch_clears_stamp_instead_of_restoring_it() {
    let mut settings = configured();
    settings.set("mdirector_daily_sent_es", "2024-03-10 09:00");
    let h = harness(
        settings,
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    h.api
        .push_envelope_result(Err(DispatchError::TransportUnavailable("down".into())));

    let report = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(
        outcome_for(&report, "es"),
        CycleOutcome::Failed { kind: "transport", .. }
    ));
    assert_eq!(
        h.store.snapshot().get("mdirector_daily_sent_es"),
        Some(&Value::Null)
    );

    // Cleared stamp means the next tick is eligible again.
    let retry = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 30), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&retry, "es"), CycleOutcome::Sent { .. }));
}

#[tokio::test]
async fn batch_mode_lifts_hour_gate_for_later_languages() {
    let mut settings = configured();
    settings.set("mdirector_hour_daily_en", "23:00");
    let items = vec![post(1, "es", at(15, 8, 0)), post(2, "en", at(15, 8, 0))];

    // Alone, `en` is not due before 23:00.
    let alone = harness(
        settings.clone(),
        &["es", "en"],
        items.clone(),
        FailurePolicy::default(),
    );
    let only_en = RunOptions {
        language: Some("en".into()),
        ..RunOptions::scheduled()
    };
    let r = alone
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &only_en)
        .await;
    assert_eq!(
        outcome_for(&r, "en"),
        &CycleOutcome::Skipped {
            reason: SkipReason::BeforeScheduledHour
        }
    );

    // After `es` went out in the same invocation, `en` follows.
    let h = harness(settings, &["es", "en"], items, FailurePolicy::default());
    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&r, "es"), CycleOutcome::Sent { .. }));
    assert!(matches!(outcome_for(&r, "en"), CycleOutcome::Sent { .. }));
    assert_eq!(h.api.envelope_count(), 2);
}

#[tokio::test]
async fn stop_on_failure_leaves_later_languages_untouched() {
    let items = vec![post(1, "es", at(15, 8, 0)), post(2, "en", at(15, 8, 0))];
    let h = harness(configured(), &["es", "en"], items, FailurePolicy::StopOnFailure);
    h.api
        .push_envelope_result(Err(DispatchError::RemoteRejected {
            code: Some(500),
            message: "boom".into(),
        }));

    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(r.languages.len(), 1);
    assert!(r.stopped_early);
    assert!(!r.is_success());
    assert_eq!(h.api.envelope_count(), 1);
    assert_eq!(h.store.snapshot().get("mdirector_daily_sent_en"), None);
}

#[tokio::test]
async fn continue_on_failure_still_serves_later_languages() {
    let items = vec![post(1, "es", at(15, 8, 0)), post(2, "en", at(15, 8, 0))];
    let h = harness(configured(), &["es", "en"], items, FailurePolicy::ContinueOnFailure);
    h.api
        .push_envelope_result(Err(DispatchError::RemoteRejected {
            code: Some(500),
            message: "boom".into(),
        }));

    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(r.languages.len(), 2);
    assert!(!r.stopped_early);
    assert_eq!(r.failed(), 1);
    assert_eq!(r.sent(), 1);
    assert_eq!(
        h.store.snapshot().raw_str("mdirector_daily_sent_en"),
        Some("2024-03-15 10:00")
    );
}

#[tokio::test]
async fn preview_renders_without_stamping_or_calling_remote() {
    let h = harness(
        configured(),
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    let r = h
        .engine
        .preview(Frequency::Daily, at(15, 7, 0), None, None)
        .await;
    let html = r.preview().expect("preview body");
    assert!(html.contains("Post 1"));
    assert!(html.contains("https://blog.test/1"));
    assert!(h.api.calls().is_empty());
    assert_eq!(h.store.snapshot().get("mdirector_daily_sent_es"), None);
}

#[tokio::test]
async fn unconfigured_store_aborts_without_remote_calls() {
    let mut settings = configured();
    settings.remove("mdirector_secret");
    let h = harness(
        settings,
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(r.aborted.is_some());
    assert!(r.languages.is_empty());
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn cadence_switched_off_is_deactivated() {
    let mut settings = configured();
    settings.set("mdirector_frequency_daily", "no");
    let h = harness(
        settings,
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(outcome_for(&r, "es"), &CycleOutcome::Deactivated);
}

#[tokio::test]
async fn reset_forgets_every_stamp() {
    let h = harness(
        configured(),
        &["es"],
        vec![post(1, "es", at(15, 8, 0))],
        FailurePolicy::default(),
    );
    h.engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(h.engine.reset_deliveries().await.unwrap(), 1);

    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 11, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&r, "es"), CycleOutcome::Sent { .. }));
}

#[tokio::test]
async fn broken_template_fails_only_its_language() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("template.html"), "<html>{{list}}</html>").unwrap();

    let mut settings = configured();
    settings.set("mdirector_template_es", "broken");
    let items = vec![post(1, "es", at(15, 8, 0)), post(2, "en", at(15, 8, 0))];
    // Default policy stops on dispatch failures; rendering ones stay local.
    let h = harness_with_templates(
        vec![dir.path().to_path_buf()],
        settings,
        &["es", "en"],
        items,
        FailurePolicy::default(),
    );

    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(
        outcome_for(&r, "es"),
        CycleOutcome::Failed { kind: "rendering", .. }
    ));
    assert!(matches!(outcome_for(&r, "en"), CycleOutcome::Sent { items: 1, .. }));
    assert!(!r.stopped_early);
    assert_eq!(h.store.snapshot().get("mdirector_daily_sent_es"), None);
    assert_eq!(
        h.store.snapshot().raw_str("mdirector_daily_sent_en"),
        Some("2024-03-15 10:00")
    );
    assert_eq!(h.api.envelope_count(), 1);
}

#[tokio::test]
async fn minimum_entries_backfills_older_posts_outside_excluded_categories() {
    let mut settings = configured();
    settings.set("mdirector_minimum_entries", "3");
    settings.set("mdirector_exclude_cats", json!([7]));

    let mut excluded = post(3, "es", at(14, 8, 0));
    excluded.category_ids = vec![7];
    let items = vec![
        // Published after the window closed at 09:00.
        post(10, "es", at(15, 9, 30)),
        post(1, "es", at(15, 8, 0)),
        excluded,
        post(2, "es", at(13, 8, 0)),
        post(4, "es", at(12, 8, 0)),
    ];
    let h = harness(settings, &["es"], items, FailurePolicy::default());

    let preview = h
        .engine
        .preview(Frequency::Daily, at(15, 10, 0), None, None)
        .await;
    let html = preview.preview().expect("preview body");
    for shown in ["Post 1<", "Post 2<", "Post 4<"] {
        assert!(html.contains(shown), "missing {shown}");
    }
    for hidden in ["Post 3<", "Post 10<"] {
        assert!(!html.contains(hidden), "unexpected {hidden}");
    }

    let r = h
        .engine
        .run_frequency(Frequency::Daily, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&r, "es"), CycleOutcome::Sent { items: 3, .. }));
}

#[tokio::test]
async fn weekly_cadence_waits_for_target_weekday() {
    let settings = Settings::from_json(json!({
        "mdirector_api": "key",
        "mdirector_secret": "secret",
        "mdirector_frequency_weekly": "yes",
        "mdirector_frequency_day": "1",
        "mdirector_hour_weekly": "09:00",
        "mdirector_weekly_list_es": [8],
    }))
    .unwrap();
    let h = harness(
        settings,
        &["es"],
        vec![post(1, "es", at(14, 8, 0))],
        FailurePolicy::default(),
    );

    // 2024-03-15 is a Friday.
    let friday = h
        .engine
        .run_frequency(Frequency::Weekly, at(15, 10, 0), &RunOptions::scheduled())
        .await;
    assert_eq!(
        outcome_for(&friday, "es"),
        &CycleOutcome::Skipped {
            reason: SkipReason::NotTargetWeekday
        }
    );
    assert_eq!(h.api.envelope_count(), 0);

    let monday = h
        .engine
        .run_frequency(Frequency::Weekly, at(18, 10, 0), &RunOptions::scheduled())
        .await;
    assert!(matches!(outcome_for(&monday, "es"), CycleOutcome::Sent { items: 1, .. }));
    assert_eq!(
        h.store.snapshot().raw_str("mdirector_weekly_sent_es"),
        Some("2024-03-18 10:00")
    );
}
