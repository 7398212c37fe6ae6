// src/notice.rs
//! Operator-facing notices derived from cycle outcomes.

use serde::Serialize;

use crate::scheduler::{CycleOutcome, CycleReport, SkipReason};
use crate::window::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Sending,
    NoEntries,
    Deactivated,
    AlreadySent,
    NotDue,
    Preview,
    Failed,
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub language: Option<String>,
    pub frequency: Frequency,
    pub message: String,
}

fn describe(outcome: &CycleOutcome) -> (NoticeLevel, NoticeKind, String) {
    use NoticeKind::*;
    use NoticeLevel::*;
    match outcome {
        CycleOutcome::Sent { items, .. } => (Info, Sending, format!("sending {items} entries")),
        CycleOutcome::NoContent => (Info, NoEntries, "no entries to send".into()),
        CycleOutcome::Deactivated => (Info, Deactivated, "delivery deactivated".into()),
        CycleOutcome::Skipped {
            reason: SkipReason::AlreadySentToday,
        } => (Info, AlreadySent, "already sent today".into()),
        CycleOutcome::Skipped { reason } => (Info, NotDue, format!("not due ({})", reason.as_str())),
        CycleOutcome::Previewed { .. } => (Info, Preview, "preview rendered".into()),
        CycleOutcome::Failed { error, .. } => (Error, Failed, format!("delivery failed: {error}")),
        CycleOutcome::NotConfigured => (Error, NotConfigured, "delivery is not configured".into()),
    }
}

/// One notice per visited language, or a single one when the run aborted.
pub fn notices_for(report: &CycleReport) -> Vec<Notice> {
    if let Some(reason) = &report.aborted {
        return vec![Notice {
            level: NoticeLevel::Error,
            kind: NoticeKind::NotConfigured,
            language: None,
            frequency: report.frequency,
            message: reason.clone(),
        }];
    }
    report
        .languages
        .iter()
        .map(|r| {
            let (level, kind, message) = describe(&r.outcome);
            Notice {
                level,
                kind,
                language: Some(r.language.clone()),
                frequency: r.frequency,
                message: format!("[{} / {}] {message}", r.language, r.frequency),
            }
        })
        .collect()
}
