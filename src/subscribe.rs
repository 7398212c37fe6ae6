// src/subscribe.rs
//! Subscription form backend. Whatever goes wrong underneath, the caller only
//! ever sees one of three answers.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{keys, Settings, SettingsStore};
use crate::content::repository::DEFAULT_LANGUAGE;
use crate::remote::DeliveryApi;
use crate::window::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("subscription failed")]
    Failed,
}

static EMAIL_RE: OnceCell<Option<Regex>> = OnceCell::new();

pub fn is_valid_email(email: &str) -> bool {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$").ok()
    });
    re.as_ref().is_some_and(|r| r.is_match(email))
}

/// `custom_list` for the language, then its regular list, then the regular
/// list of the default language.
pub fn resolve_list(settings: &Settings, frequency: Frequency, lang: &str) -> Option<String> {
    let first_list = |l: &str| {
        settings
            .ids(&keys::audience(frequency, keys::AudienceKind::List, false, l))
            .into_iter()
            .next()
    };
    settings
        .text(&keys::custom_list(frequency, lang))
        .or_else(|| first_list(lang))
        .or_else(|| first_list(DEFAULT_LANGUAGE))
}

#[derive(Clone)]
pub struct Subscriptions {
    store: Arc<dyn SettingsStore>,
    api: Arc<dyn DeliveryApi>,
}

impl Subscriptions {
    pub fn new(store: Arc<dyn SettingsStore>, api: Arc<dyn DeliveryApi>) -> Self {
        Self { store, api }
    }

    /// Add `email` to the list for `frequency` and `lang`. Returns the list id.
    pub async fn subscribe(
        &self,
        email: &str,
        frequency: Frequency,
        lang: &str,
    ) -> Result<String, SubscribeError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(SubscribeError::InvalidEmail);
        }
        let settings = self.store.load().await.map_err(|e| {
            warn!(target: "subscribe", error = %e, "settings unavailable");
            SubscribeError::Failed
        })?;
        let creds = match settings.credentials() {
            Some(c) if settings.is_configured() => c,
            _ => {
                warn!(target: "subscribe", "delivery not configured");
                return Err(SubscribeError::Failed);
            }
        };
        let Some(list_id) = resolve_list(&settings, frequency, lang) else {
            warn!(target: "subscribe", lang, %frequency, "no list configured");
            return Err(SubscribeError::Failed);
        };

        match self.api.subscribe(&creds, &list_id, email).await {
            Ok(()) => {
                info!(target: "subscribe", lang, %frequency, list_id = %list_id, "contact added");
                Ok(list_id)
            }
            Err(e) if e.is_duplicate_contact() => Err(SubscribeError::AlreadyRegistered),
            Err(e) => {
                warn!(target: "subscribe", lang, %frequency, error = %e, "contact rejected");
                Err(SubscribeError::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.es"));
        assert!(!is_valid_email("ana@"));
        assert!(!is_valid_email("ana.example.com"));
        assert!(!is_valid_email("ana@localhost"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn list_resolution_order() {
        let mut s = Settings::new();
        assert_eq!(resolve_list(&s, Frequency::Daily, "en"), None);
        s.set("mdirector_daily_list_es", json!([4]));
        assert_eq!(resolve_list(&s, Frequency::Daily, "en").as_deref(), Some("4"));
        s.set("mdirector_daily_list_en", "8");
        assert_eq!(resolve_list(&s, Frequency::Daily, "en").as_deref(), Some("8"));
        s.set("mdirector_daily_custom_list_en", "99");
        assert_eq!(resolve_list(&s, Frequency::Daily, "en").as_deref(), Some("99"));
        assert_eq!(resolve_list(&s, Frequency::Weekly, "en"), None);
    }
}
