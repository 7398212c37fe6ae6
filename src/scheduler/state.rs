// src/scheduler/state.rs
//! `lastSentAt` bookkeeping. The stamp is written before the remote call and
//! cleared (not restored) when the call fails.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::debug;

use crate::config::schedule::format_stamp;
use crate::config::store::update;
use crate::config::{keys, SettingsStore};
use crate::window::Frequency;

#[async_trait]
pub trait ScheduleState: Send + Sync {
    /// Content was found and a send is about to start.
    async fn mark_attempted(&self, lang: &str, frequency: Frequency, at: NaiveDateTime) -> Result<()>;
    async fn mark_succeeded(&self, lang: &str, frequency: Frequency, at: NaiveDateTime) -> Result<()>;
    /// The send failed; the stamp goes back to unset.
    async fn mark_failed(&self, lang: &str, frequency: Frequency) -> Result<()>;
    /// Forget every stamp, both frequencies, all languages.
    async fn reset_all(&self) -> Result<usize>;
}

/// Keeps stamps in the settings blob under `mdirector_<freq>_sent_<lang>`.
#[derive(Clone)]
pub struct StoreScheduleState {
    store: Arc<dyn SettingsStore>,
}

impl StoreScheduleState {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }
}

fn is_stamp_key(key: &str) -> bool {
    Frequency::ALL
        .iter()
        .any(|f| key.starts_with(&format!("mdirector_{f}_sent_")))
}

#[async_trait]
impl ScheduleState for StoreScheduleState {
    async fn mark_attempted(&self, lang: &str, frequency: Frequency, at: NaiveDateTime) -> Result<()> {
        let key = keys::last_sent(frequency, lang);
        update(self.store.as_ref(), |s| s.set(key, format_stamp(at))).await?;
        debug!(target: "scheduler", lang, %frequency, "stamped lastSentAt");
        Ok(())
    }

    async fn mark_succeeded(&self, lang: &str, frequency: Frequency, at: NaiveDateTime) -> Result<()> {
        let key = keys::last_sent(frequency, lang);
        let current = self.store.load().await?;
        if current.raw_str(&key).is_none() {
            update(self.store.as_ref(), |s| s.set(key, format_stamp(at))).await?;
        }
        Ok(())
    }

    async fn mark_failed(&self, lang: &str, frequency: Frequency) -> Result<()> {
        let key = keys::last_sent(frequency, lang);
        update(self.store.as_ref(), |s| s.clear(key)).await?;
        debug!(target: "scheduler", lang, %frequency, "cleared lastSentAt after failure");
        Ok(())
    }

    async fn reset_all(&self) -> Result<usize> {
        let mut cleared = 0usize;
        update(self.store.as_ref(), |s| {
            let stamps: Vec<String> = s
                .keys()
                .filter(|k| is_stamp_key(k))
                .map(str::to_string)
                .collect();
            cleared = stamps.len();
            for k in stamps {
                s.clear(k);
            }
        })
        .await?;
        Ok(cleared)
    }
}
