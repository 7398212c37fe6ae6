// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::window::Frequency;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls share it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())?
            .clone();
        ensure_described();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time registration so series show up on /metrics before first use.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "newsletter_cycles_total",
            "Per-language delivery cycles by frequency and outcome."
        );
        describe_counter!(
            "newsletter_dispatch_failures_total",
            "Dispatch attempts that failed, by error kind."
        );
        describe_counter!(
            "newsletter_trigger_failures_total",
            "Best-effort send triggers that failed after envelope creation."
        );
        describe_counter!("newsletter_cron_runs_total", "Accepted cron fires.");
        describe_counter!(
            "newsletter_cron_debounced_total",
            "Cron fires suppressed by the debounce guard."
        );
        describe_histogram!("newsletter_render_ms", "Template render time in milliseconds.");
    });
}

pub fn record_cycle(frequency: Frequency, outcome: &'static str) {
    counter!("newsletter_cycles_total", "frequency" => frequency.as_str(), "outcome" => outcome)
        .increment(1);
}

pub fn record_dispatch_failure(kind: &'static str) {
    counter!("newsletter_dispatch_failures_total", "kind" => kind).increment(1);
}

pub fn record_trigger_failure() {
    counter!("newsletter_trigger_failures_total").increment(1);
}

pub fn record_cron_run() {
    counter!("newsletter_cron_runs_total").increment(1);
}

pub fn record_cron_debounced() {
    counter!("newsletter_cron_debounced_total").increment(1);
}

pub fn record_render_ms(ms: f64) {
    histogram!("newsletter_render_ms").record(ms);
}
