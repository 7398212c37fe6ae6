// src/scheduler/gate.rs
//! Eligibility predicate for one (language, frequency) pair.

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use crate::config::ScheduleConfig;
use crate::window::{DeliveryWindow, Frequency};

/// Who asked for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Periodic tick: every gate applies.
    #[default]
    Scheduled,
    /// Explicit operator action: resend allowed, no calendar gates.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    WeekdayDisabled,
    NotTargetWeekday,
    AlreadySentToday,
    BeforeScheduledHour,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::WeekdayDisabled => "weekday_disabled",
            SkipReason::NotTargetWeekday => "not_target_weekday",
            SkipReason::AlreadySentToday => "already_sent",
            SkipReason::BeforeScheduledHour => "window_closed",
        }
    }
}

/// `batch` is set once an earlier language in the same invocation was
/// dispatched; it lifts the time-of-day gate only.
pub fn can_send(
    cfg: &ScheduleConfig,
    now: NaiveDateTime,
    mode: TriggerMode,
    batch: bool,
) -> Result<DeliveryWindow, SkipReason> {
    let window = DeliveryWindow::compute(now, cfg.window_hour, cfg.frequency);
    if mode == TriggerMode::Manual {
        return Ok(window);
    }

    let today = now.date();
    match cfg.frequency {
        Frequency::Daily if !cfg.allowed_weekdays.contains(&today.weekday()) => {
            return Err(SkipReason::WeekdayDisabled)
        }
        Frequency::Weekly if today.weekday() != cfg.target_weekday => {
            return Err(SkipReason::NotTargetWeekday)
        }
        _ => {}
    }

    if cfg.last_sent_at.is_some_and(|ts| ts.date() == today) {
        return Err(SkipReason::AlreadySentToday);
    }

    if !batch && !window.is_open_at(now) {
        return Err(SkipReason::BeforeScheduledHour);
    }

    Ok(window)
}
