// src/logging.rs
use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stand-in for the API secret wherever request context is logged.
pub const SECRET_MASK: &str = "**********";

pub const DEFAULT_FILTER: &str =
    "mdirector_newsletter=info,scheduler=info,dispatch=info,remote=info,manual=info,cron=info,subscribe=info,provision=info,warn";

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`. Safe to call
/// twice; the second call is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, SECRET_MASK)
}

/// Short fingerprint so a logged payload can be correlated without being logged.
pub fn content_digest(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hash.iter().take(6).map(|b| format!("{b:02x}")).collect()
}
