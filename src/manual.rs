// src/manual.rs
//! Single-post delivery: an editor's "send this now", or the automatic send
//! when a post is first published. No window or eligibility checks; the
//! stamp bookkeeping of the scheduled path is not touched.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{keys, Settings, SettingsStore};
use crate::content::repository::DEFAULT_LANGUAGE;
use crate::content::{ContentItem, ContentRepository, ContentStatus, RawContent};
use crate::dispatch::{DeliveryDraft, Delivered, Dispatcher};
use crate::error::DispatchError;
use crate::render::{SubjectConfig, TemplateRenderer};
use crate::window::Frequency;

/// Cadence single-post deliveries are filed under.
pub const MANUAL_FREQUENCY: Frequency = Frequency::Daily;

/// The post's own language, else the site default.
pub fn delivery_language(raw: &RawContent) -> String {
    raw.language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    NotFirstPublish,
    SchedulerInactive,
    TypeNotAllowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Ignored { reason: IgnoreReason },
    Delivered { delivery: Delivered },
}

/// Content kinds and taxonomies allowed to fire on publish.
pub fn allowed_types(settings: &Settings) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if settings.is_on(keys::SCHEDULER_POSTS) {
        out.insert(crate::content::DEFAULT_CONTENT_KIND.to_string());
    }
    for id in settings.ids(keys::SCHEDULER_TAXONOMIES) {
        out.extend(
            id.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
    }
    out
}

fn is_allowed(raw: &RawContent, allowed: &BTreeSet<String>) -> bool {
    allowed.contains(&raw.kind) || raw.taxonomies.iter().any(|t| allowed.contains(t))
}

#[derive(Clone)]
pub struct ManualDelivery {
    store: Arc<dyn SettingsStore>,
    content: Arc<dyn ContentRepository>,
    renderer: Arc<TemplateRenderer>,
    dispatcher: Dispatcher,
}

impl ManualDelivery {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        content: Arc<dyn ContentRepository>,
        renderer: Arc<TemplateRenderer>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            content,
            renderer,
            dispatcher,
        }
    }

    pub async fn deliver_post(
        &self,
        post_id: u64,
        today: chrono::NaiveDate,
        preview: bool,
    ) -> Result<Delivered, DispatchError> {
        let settings = self.store.load().await?;
        if !settings.is_configured() {
            return Err(DispatchError::ConfigurationIncomplete);
        }
        let raw = self
            .content
            .get_by_id(post_id)
            .await?
            .ok_or(DispatchError::ContentNotFound(post_id))?;
        self.deliver_raw(&settings, raw, today, preview).await
    }

    async fn deliver_raw(
        &self,
        settings: &Settings,
        raw: RawContent,
        today: chrono::NaiveDate,
        preview: bool,
    ) -> Result<Delivered, DispatchError> {
        let overrides = raw.overrides.clone();
        let post_id = raw.id;
        let language = delivery_language(&raw);
        let items = vec![ContentItem::from(raw)];

        let template = self.renderer.catalog().resolve_name(
            overrides.template.as_deref(),
            settings,
            &language,
        );
        let subject = match overrides.subject.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => SubjectConfig::fixed(s),
            _ => SubjectConfig::from_settings(settings, MANUAL_FREQUENCY, &language),
        };
        let rendered = self
            .renderer
            .render(&items, &template, &subject, MANUAL_FREQUENCY)?;

        let draft = DeliveryDraft {
            frequency: MANUAL_FREQUENCY,
            language,
            date: today,
            subject: rendered.subject,
            html: rendered.html,
            audience: overrides.audience,
            from_name: overrides
                .from_name
                .or_else(|| settings.text(keys::SCHEDULER_DEFAULT_FROM)),
            delivery_name: overrides.delivery_name,
            campaign: overrides.campaign,
        };
        let out = self.dispatcher.deliver(settings, draft, preview).await;
        match &out {
            Ok(Delivered::Sent(r)) => {
                info!(target: "manual", post_id, env_id = ?r.envelope_id, "post delivered")
            }
            Ok(Delivered::Previewed(_)) => info!(target: "manual", post_id, "post previewed"),
            Err(e) => warn!(target: "manual", post_id, error = %e, "post delivery failed"),
        }
        out
    }

    /// Publish hook: fires only on the first transition into `publish`, for
    /// items flagged for scheduling whose type is allow-listed.
    pub async fn on_status_transition(
        &self,
        post_id: u64,
        old: ContentStatus,
        new: ContentStatus,
        today: chrono::NaiveDate,
    ) -> Result<TransitionOutcome, DispatchError> {
        if new != ContentStatus::Publish || old == ContentStatus::Publish {
            return Ok(TransitionOutcome::Ignored {
                reason: IgnoreReason::NotFirstPublish,
            });
        }
        let settings = self.store.load().await?;
        let raw = self
            .content
            .get_by_id(post_id)
            .await?
            .ok_or(DispatchError::ContentNotFound(post_id))?;

        if !raw.overrides.scheduler_active {
            return Ok(TransitionOutcome::Ignored {
                reason: IgnoreReason::SchedulerInactive,
            });
        }
        if !is_allowed(&raw, &allowed_types(&settings)) {
            info!(target: "manual", post_id, kind = %raw.kind, "type not in allow-list");
            return Ok(TransitionOutcome::Ignored {
                reason: IgnoreReason::TypeNotAllowed,
            });
        }
        if !settings.is_configured() {
            return Err(DispatchError::ConfigurationIncomplete);
        }
        let delivery = self.deliver_raw(&settings, raw, today, false).await?;
        Ok(TransitionOutcome::Delivered { delivery })
    }
}
