// src/dispatch/mod.rs
//! Builds the remote envelope for a rendered newsletter, submits it and
//! fires it.

pub mod audience;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{keys, Settings};
use crate::error::DispatchError;
use crate::logging::content_digest;
use crate::remote::{DeliveryApi, EnvelopeRequest};
use crate::window::Frequency;

pub use audience::Audience;

pub const DEFAULT_SENDER: &str = "Hello";

/// Caller-side description of one delivery before defaults are applied.
#[derive(Debug, Clone)]
pub struct DeliveryDraft {
    pub frequency: Frequency,
    pub language: String,
    pub date: NaiveDate,
    pub subject: String,
    pub html: String,
    /// Empty means "use the configured audience".
    pub audience: Audience,
    pub from_name: Option<String>,
    pub delivery_name: Option<String>,
    pub campaign: Option<String>,
}

/// Fully resolved payload handed to the remote API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchPayload {
    pub subject: String,
    pub html: String,
    pub audience: Audience,
    pub from_name: String,
    pub delivery_name: String,
    pub campaign: Option<String>,
    pub language: String,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl DispatchPayload {
    /// Apply audience fallback, sender, campaign and name defaults.
    pub fn resolve(draft: DeliveryDraft, settings: &Settings) -> Self {
        let f = draft.frequency;
        let lang = draft.language;
        let audience = draft
            .audience
            .or_fallback(|| Audience::configured(settings, f, &lang));

        let from_name = non_blank(draft.from_name)
            .or_else(|| settings.text(&keys::sender(f)))
            .unwrap_or_else(|| DEFAULT_SENDER.to_string());

        let campaign = non_blank(draft.campaign).or_else(|| {
            settings
                .use_test_lists()
                .then(|| settings.text(&keys::campaign_tests(f)))
                .flatten()
                .or_else(|| settings.text(&keys::campaign(f, &lang)))
        });

        let delivery_name =
            non_blank(draft.delivery_name).unwrap_or_else(|| f.delivery_name(draft.date));

        Self {
            subject: draft.subject,
            html: draft.html,
            audience,
            from_name,
            delivery_name,
            campaign,
            language: lang,
        }
    }

    pub fn tokens(&self) -> Vec<Value> {
        self.audience.tokens()
    }

    pub fn to_envelope(&self) -> EnvelopeRequest {
        EnvelopeRequest {
            kind: "email".to_string(),
            name: self.delivery_name.clone(),
            from_name: self.from_name.clone(),
            subject: self.subject.clone(),
            campaign: self.campaign.clone(),
            language: self.language.clone(),
            creativity: EnvelopeRequest::encode_creativity(&self.html),
            segments: Value::Array(self.tokens()).to_string(),
        }
    }
}

/// Outcome of the best-effort "send now" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TriggerStatus {
    Fired,
    Failed(String),
    /// The remote returned no envelope id to fire.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub envelope_id: Option<String>,
    pub trigger: TriggerStatus,
}

pub type DispatchResult = Result<DispatchReceipt, DispatchError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum Delivered {
    Sent(DispatchReceipt),
    /// Rendered body returned instead of sending.
    Previewed(String),
}

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn DeliveryApi>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn DeliveryApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn DeliveryApi> {
        &self.api
    }

    /// Preview returns the body without touching the remote API.
    pub async fn deliver(
        &self,
        settings: &Settings,
        draft: DeliveryDraft,
        preview: bool,
    ) -> Result<Delivered, DispatchError> {
        if !settings.is_configured() {
            return Err(DispatchError::ConfigurationIncomplete);
        }
        if preview {
            return Ok(Delivered::Previewed(draft.html));
        }
        let payload = DispatchPayload::resolve(draft, settings);
        self.dispatch(settings, &payload).await.map(Delivered::Sent)
    }

    pub async fn dispatch(&self, settings: &Settings, payload: &DispatchPayload) -> DispatchResult {
        let creds = settings
            .credentials()
            .filter(|_| settings.is_configured())
            .ok_or(DispatchError::ConfigurationIncomplete)?;

        if payload.audience.is_empty() {
            warn!(
                target: "dispatch",
                language = %payload.language,
                name = %payload.delivery_name,
                "no audience resolved; not calling remote"
            );
            crate::metrics::record_dispatch_failure(DispatchError::EmptyAudience.kind());
            return Err(DispatchError::EmptyAudience);
        }

        let request = payload.to_envelope();
        let env_id = match self.api.create_envelope(&creds, &request).await {
            Ok(id) => id,
            Err(e) => {
                error!(
                    target: "dispatch",
                    language = %payload.language,
                    name = %payload.delivery_name,
                    subject = %payload.subject,
                    segments = %request.segments,
                    campaign = ?payload.campaign,
                    creativity_len = payload.html.len(),
                    creativity_digest = %content_digest(&payload.html),
                    error = %e,
                    "envelope creation failed"
                );
                crate::metrics::record_dispatch_failure(e.kind());
                return Err(e);
            }
        };

        let trigger = match env_id.as_deref() {
            None => TriggerStatus::Skipped,
            Some(id) => match self.api.trigger_envelope(&creds, id).await {
                Ok(()) => TriggerStatus::Fired,
                Err(e) => {
                    warn!(target: "dispatch", env_id = id, error = %e, "send trigger failed");
                    crate::metrics::record_trigger_failure();
                    TriggerStatus::Failed(e.to_string())
                }
            },
        };

        info!(
            target: "dispatch",
            language = %payload.language,
            name = %payload.delivery_name,
            env_id = ?env_id,
            trigger = ?trigger,
            "delivery submitted"
        );
        Ok(DispatchReceipt {
            envelope_id: env_id,
            trigger,
        })
    }
}
