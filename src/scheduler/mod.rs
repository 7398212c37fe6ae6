// src/scheduler/mod.rs
//! Per-language delivery driver.
//!
//! Each (language, frequency) pair is re-evaluated on every invocation; the
//! only persisted state is `lastSentAt`. A language moves through
//! `window closed -> eligible -> content found -> sent`, or ends at
//! `no content` without touching the stamp so the next tick retries.

pub mod gate;
pub mod state;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{ScheduleConfig, Settings, SettingsStore};
use crate::content::{ContentRepository, ContentSelector};
use crate::dispatch::{Audience, DeliveryDraft, DispatchPayload, DispatchReceipt, Dispatcher};
use crate::error::DispatchError;
use crate::render::TemplateRenderer;
use crate::window::Frequency;

pub use gate::{can_send, SkipReason, TriggerMode};
pub use state::{ScheduleState, StoreScheduleState};

/// What the language loop does after a failed dispatch. Rendering
/// failures never stop the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop processing further languages in this invocation.
    #[default]
    StopOnFailure,
    ContinueOnFailure,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: TriggerMode,
    /// Render and return the first eligible body instead of sending.
    pub preview: bool,
    /// Template override for this run.
    pub template: Option<String>,
    /// Restrict the run to one language.
    pub language: Option<String>,
}

impl RunOptions {
    pub fn scheduled() -> Self {
        Self::default()
    }

    pub fn manual() -> Self {
        Self {
            mode: TriggerMode::Manual,
            ..Self::default()
        }
    }

    pub fn preview() -> Self {
        Self {
            mode: TriggerMode::Manual,
            preview: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleOutcome {
    NotConfigured,
    /// Cadence off or no audience for this language.
    Deactivated,
    Skipped { reason: SkipReason },
    NoContent,
    Previewed { subject: String, html: String },
    Sent { subject: String, items: usize, receipt: DispatchReceipt },
    Failed { error: String, kind: &'static str },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NotConfigured => "not_configured",
            CycleOutcome::Deactivated => "deactivated",
            CycleOutcome::Skipped { reason } => reason.as_str(),
            CycleOutcome::NoContent => "no_content",
            CycleOutcome::Previewed { .. } => "previewed",
            CycleOutcome::Sent { .. } => "sent",
            CycleOutcome::Failed { .. } => "failed",
        }
    }

    fn failed(e: &DispatchError) -> Self {
        CycleOutcome::Failed {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageReport {
    pub language: String,
    pub frequency: Frequency,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub frequency: Frequency,
    pub languages: Vec<LanguageReport>,
    /// Set when the run ended before every language was visited.
    pub stopped_early: bool,
    /// Set when the run could not start at all.
    pub aborted: Option<String>,
}

impl CycleReport {
    fn aborted(frequency: Frequency, e: &DispatchError) -> Self {
        Self {
            frequency,
            languages: Vec::new(),
            stopped_early: false,
            aborted: Some(e.to_string()),
        }
    }

    pub fn preview(&self) -> Option<&str> {
        self.languages.iter().find_map(|r| match &r.outcome {
            CycleOutcome::Previewed { html, .. } => Some(html.as_str()),
            _ => None,
        })
    }

    pub fn sent(&self) -> usize {
        self.languages
            .iter()
            .filter(|r| matches!(r.outcome, CycleOutcome::Sent { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.languages
            .iter()
            .filter(|r| matches!(r.outcome, CycleOutcome::Failed { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0
    }
}

#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn SettingsStore>,
    content: Arc<dyn ContentRepository>,
    renderer: Arc<TemplateRenderer>,
    dispatcher: Dispatcher,
    state: Arc<dyn ScheduleState>,
    policy: FailurePolicy,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        content: Arc<dyn ContentRepository>,
        renderer: Arc<TemplateRenderer>,
        dispatcher: Dispatcher,
        state: Arc<dyn ScheduleState>,
    ) -> Self {
        Self {
            store,
            content,
            renderer,
            dispatcher,
            state,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Visit every configured language in repository order.
    pub async fn run(&self, frequency: Frequency, now: NaiveDateTime, opts: &RunOptions) -> CycleReport {
        let settings = match self.store.load().await {
            Ok(s) => s,
            Err(e) => {
                let e = DispatchError::from(e);
                error!(target: "scheduler", %frequency, error = %e, "settings unavailable");
                return CycleReport::aborted(frequency, &e);
            }
        };
        if !settings.is_configured() {
            warn!(target: "scheduler", %frequency, "delivery not configured; skipping cycle");
            crate::metrics::record_cycle(frequency, CycleOutcome::NotConfigured.label());
            return CycleReport::aborted(frequency, &DispatchError::ConfigurationIncomplete);
        }

        let languages = match self.content.languages().await {
            Ok(l) => l,
            Err(e) => return CycleReport::aborted(frequency, &DispatchError::from(e)),
        };

        let mut report = CycleReport {
            frequency,
            languages: Vec::new(),
            stopped_early: false,
            aborted: None,
        };
        let mut batch = false;

        let targets: Vec<&String> = languages
            .iter()
            .filter(|l| opts.language.as_ref().is_none_or(|only| only == *l))
            .collect();

        for (i, lang) in targets.iter().enumerate() {
            let outcome = self.run_language(lang, frequency, now, opts, batch).await;
            crate::metrics::record_cycle(frequency, outcome.label());

            let stop = match &outcome {
                CycleOutcome::Sent { .. } => {
                    batch = true;
                    false
                }
                CycleOutcome::Previewed { .. } => true,
                // A template problem is local to its language.
                CycleOutcome::Failed { kind, .. } => {
                    self.policy == FailurePolicy::StopOnFailure && *kind != "rendering"
                }
                _ => false,
            };
            report.languages.push(LanguageReport {
                language: lang.to_string(),
                frequency,
                outcome,
            });
            if stop {
                report.stopped_early = i + 1 < targets.len();
                break;
            }
        }
        report
    }

    /// One language, with a fresh settings snapshot.
    pub async fn run_language(
        &self,
        lang: &str,
        frequency: Frequency,
        now: NaiveDateTime,
        opts: &RunOptions,
        batch: bool,
    ) -> CycleOutcome {
        let settings = match self.store.load().await {
            Ok(s) => s,
            Err(e) => return CycleOutcome::failed(&DispatchError::from(e)),
        };
        if !settings.is_configured() {
            return CycleOutcome::NotConfigured;
        }

        let cfg = ScheduleConfig::from_settings(&settings, lang, frequency);
        if !cfg.is_active() {
            info!(target: "scheduler", lang, %frequency, "deactivated");
            return CycleOutcome::Deactivated;
        }

        let window = match can_send(&cfg, now, opts.mode, batch) {
            Ok(w) => w,
            Err(reason) => {
                info!(target: "scheduler", lang, %frequency, reason = reason.as_str(), "not eligible");
                return CycleOutcome::Skipped { reason };
            }
        };

        let items = match ContentSelector::new(self.content.as_ref())
            .select(
                &window,
                lang,
                &cfg.excluded_category_ids,
                cfg.minimum_entries,
            )
            .await
        {
            Ok(items) => items,
            Err(e) => return CycleOutcome::failed(&DispatchError::from(e)),
        };
        if items.is_empty() {
            info!(target: "scheduler", lang, %frequency, from = %window.from, to = %window.to, "no entries");
            return CycleOutcome::NoContent;
        }

        let template = self
            .renderer
            .catalog()
            .resolve_name(opts.template.as_deref(), &settings, lang);
        let rendered = match self.renderer.render(&items, &template, &cfg.subject, frequency) {
            Ok(r) => r,
            Err(e) => {
                error!(target: "scheduler", lang, %frequency, template = %template, error = %e, "render failed");
                return CycleOutcome::failed(&e);
            }
        };

        if opts.preview {
            return CycleOutcome::Previewed {
                subject: rendered.subject,
                html: rendered.html,
            };
        }

        if let Err(e) = self.state.mark_attempted(lang, frequency, now).await {
            return CycleOutcome::failed(&DispatchError::from(e));
        }

        let payload = DispatchPayload::resolve(
            DeliveryDraft {
                frequency,
                language: lang.to_string(),
                date: now.date(),
                subject: rendered.subject.clone(),
                html: rendered.html,
                audience: Audience::default(),
                from_name: None,
                delivery_name: None,
                campaign: None,
            },
            &settings,
        );

        match self.dispatcher.dispatch(&settings, &payload).await {
            Ok(receipt) => {
                if let Err(e) = self.state.mark_succeeded(lang, frequency, now).await {
                    warn!(target: "scheduler", lang, %frequency, error = %e, "could not confirm stamp");
                }
                info!(target: "scheduler", lang, %frequency, items = items.len(), "sent");
                CycleOutcome::Sent {
                    subject: rendered.subject,
                    items: items.len(),
                    receipt,
                }
            }
            Err(e) => {
                if let Err(se) = self.state.mark_failed(lang, frequency).await {
                    error!(target: "scheduler", lang, %frequency, error = %se, "could not roll back stamp");
                }
                warn!(target: "scheduler", lang, %frequency, error = %e, "dispatch failed");
                CycleOutcome::failed(&e)
            }
        }
    }
}
