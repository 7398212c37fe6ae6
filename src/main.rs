//! Newsletter Service: binary entrypoint
//! Boots the Axum HTTP server and the periodic cron ticker over one shared
//! engine.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing::info;

use mdirector_newsletter::config::AppConfig;
use mdirector_newsletter::cron::spawn_cron_ticker;
use mdirector_newsletter::logging::init_tracing;
use mdirector_newsletter::{api, NewsletterEngine};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let engine = Arc::new(
        NewsletterEngine::from_config(&cfg)
            .await
            .map_err(shuttle_runtime::Error::Custom)?,
    );

    // Fires every `cron_interval_secs`; the debounce guards overlapping fires.
    spawn_cron_ticker(engine.clone(), cfg.cron_interval_secs);
    info!(
        interval_secs = cfg.cron_interval_secs,
        api_base = %cfg.api_base_url,
        "newsletter engine started"
    );

    let router = api::router(engine);
    Ok(router.into())
}
