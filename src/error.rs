// src/error.rs
//! Failure taxonomy for a dispatch cycle.
//!
//! "No content" is deliberately absent: an empty selection is a normal
//! terminal state of the scheduler, not an error.

use thiserror::Error;

/// Remote error code the contact endpoint uses for an already-registered email.
pub const DUPLICATE_CONTACT_CODE: i64 = 1145;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// API credentials missing or the engine switched off in settings.
    #[error("newsletter delivery is not configured")]
    ConfigurationIncomplete,

    /// No lists, segments or groups resolved after fallback.
    #[error("no audience resolved for delivery")]
    EmptyAudience,

    /// The remote API answered with an error envelope.
    #[error("remote API rejected the request (code {code:?}): {message}")]
    RemoteRejected { code: Option<i64>, message: String },

    /// HTTP or signing layer failed before a usable answer came back.
    #[error("remote API unavailable: {0}")]
    TransportUnavailable(String),

    /// No renderable template, or the template engine failed.
    #[error("rendering failed: {0}")]
    Rendering(String),

    #[error("content item {0} not found")]
    ContentNotFound(u64),

    #[error("settings store error: {0}")]
    Store(String),
}

impl DispatchError {
    pub fn is_duplicate_contact(&self) -> bool {
        matches!(
            self,
            DispatchError::RemoteRejected {
                code: Some(DUPLICATE_CONTACT_CODE),
                ..
            }
        )
    }

    /// Short label used for metrics and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ConfigurationIncomplete => "not_configured",
            DispatchError::EmptyAudience => "empty_audience",
            DispatchError::RemoteRejected { .. } => "remote_rejected",
            DispatchError::TransportUnavailable(_) => "transport",
            DispatchError::Rendering(_) => "rendering",
            DispatchError::ContentNotFound(_) => "content_not_found",
            DispatchError::Store(_) => "store",
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(e: anyhow::Error) -> Self {
        DispatchError::Store(format!("{e:#}"))
    }
}
