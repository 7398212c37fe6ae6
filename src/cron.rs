// src/cron.rs
//! Periodic entry point. Every fire passes a 60-second debounce keyed on the
//! stored launcher stamp, then runs each enabled cadence.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::store::update;
use crate::config::{keys, SettingsStore};
use crate::engine::NewsletterEngine;
use crate::scheduler::{CycleReport, RunOptions, Scheduler};
use crate::window::Frequency;

pub const DEBOUNCE_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CronOutcome {
    /// Another fire was accepted less than a minute ago.
    Debounced { last_fire: i64 },
    Ran { reports: Vec<CycleReport> },
}

/// Record `now_unix` as the last fire unless one landed within the debounce
/// window. Returns the previous stamp when suppressed.
pub async fn claim_slot(store: &dyn SettingsStore, now_unix: i64) -> Result<Option<i64>> {
    let mut blocked = None;
    update(store, |s| {
        if let Some(last) = s.int(keys::LAST_CRON_LAUNCHER) {
            if now_unix - last < DEBOUNCE_SECS && now_unix >= last {
                blocked = Some(last);
                return;
            }
        }
        s.set(keys::LAST_CRON_LAUNCHER, now_unix);
    })
    .await?;
    Ok(blocked)
}

pub async fn run_cron(
    scheduler: &Scheduler,
    store: &dyn SettingsStore,
    now: NaiveDateTime,
) -> Result<CronOutcome> {
    let now_unix = now.and_utc().timestamp();
    if let Some(last_fire) = claim_slot(store, now_unix).await? {
        crate::metrics::record_cron_debounced();
        debug!(target: "cron", last_fire, now_unix, "debounced");
        return Ok(CronOutcome::Debounced { last_fire });
    }
    crate::metrics::record_cron_run();

    let settings = store.load().await?;
    let mut reports = Vec::new();
    for frequency in Frequency::ALL {
        if !settings.is_on(&keys::frequency_enabled(frequency)) {
            continue;
        }
        let report = scheduler.run(frequency, now, &RunOptions::scheduled()).await;
        info!(
            target: "cron",
            %frequency,
            sent = report.sent(),
            failed = report.failed(),
            "cycle finished"
        );
        reports.push(report);
    }
    Ok(CronOutcome::Ran { reports })
}

/// Fire the cron entry every `interval_secs` using the local wall clock.
pub fn spawn_cron_ticker(engine: Arc<NewsletterEngine>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let now = chrono::Local::now().naive_local();
            match engine.run_cron(now).await {
                Ok(CronOutcome::Ran { reports }) => {
                    debug!(target: "cron", cycles = reports.len(), "tick done")
                }
                Ok(CronOutcome::Debounced { .. }) => {}
                Err(e) => warn!(target: "cron", error = %e, "tick failed"),
            }
        }
    })
}
