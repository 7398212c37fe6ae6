// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod content;
pub mod cron;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logging;
pub mod manual;
pub mod metrics;
pub mod notice;
pub mod provision;
pub mod remote;
pub mod render;
pub mod scheduler;
pub mod subscribe;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{AppConfig, Settings};
pub use crate::engine::NewsletterEngine;
pub use crate::error::DispatchError;
pub use crate::scheduler::{CycleOutcome, CycleReport, FailurePolicy, RunOptions, Scheduler};
pub use crate::window::{DeliveryWindow, Frequency, ScheduleHour};
