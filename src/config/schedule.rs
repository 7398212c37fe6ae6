// src/config/schedule.rs
use chrono::{NaiveDate, NaiveDateTime, Weekday};

use super::{keys, Settings};
use crate::dispatch::audience::Audience;
use crate::render::SubjectConfig;
use crate::window::{Frequency, ScheduleHour};

/// Storage format of `lastSentAt`.
pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn parse_stamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, STAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_stamp(ts: NaiveDateTime) -> String {
    ts.format(STAMP_FORMAT).to_string()
}

/// Per (language, frequency) view of the settings blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub language: String,
    pub frequency: Frequency,
    /// The cadence is switched on.
    pub enabled: bool,
    pub test_mode: bool,
    pub last_sent_at: Option<NaiveDateTime>,
    pub window_hour: ScheduleHour,
    /// Daily only.
    pub allowed_weekdays: Vec<Weekday>,
    /// Weekly only.
    pub target_weekday: Weekday,
    pub minimum_entries: Option<usize>,
    pub excluded_category_ids: Vec<i64>,
    pub subject: SubjectConfig,
    pub audience: Audience,
}

impl ScheduleConfig {
    pub fn from_settings(settings: &Settings, language: &str, frequency: Frequency) -> Self {
        let hour_raw = settings
            .text(&keys::hour_for_lang(frequency, language))
            .or_else(|| settings.text(&keys::hour(frequency)));

        let target_weekday = settings
            .int(keys::WEEKLY_DAY)
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|i| WEEK.get(i).copied())
            .unwrap_or(Weekday::Mon);

        Self {
            language: language.to_string(),
            frequency,
            enabled: settings.is_on(&keys::frequency_enabled(frequency)),
            test_mode: settings.use_test_lists(),
            last_sent_at: settings
                .raw_str(&keys::last_sent(frequency, language))
                .and_then(parse_stamp),
            window_hour: ScheduleHour::parse_or_midnight(hour_raw.as_deref()),
            allowed_weekdays: WEEK
                .iter()
                .copied()
                .filter(|d| !settings.is_set_off(&keys::weekday_toggle(*d)))
                .collect(),
            target_weekday,
            minimum_entries: settings
                .int(keys::MINIMUM_ENTRIES)
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0),
            excluded_category_ids: settings
                .ids(keys::EXCLUDE_CATS)
                .iter()
                .filter_map(|id| id.parse::<i64>().ok())
                .map(i64::abs)
                .collect(),
            subject: SubjectConfig::from_settings(settings, frequency, language),
            audience: Audience::configured(settings, frequency, language),
        }
    }

    /// Test mode only needs an audience; otherwise the cadence must be on too.
    pub fn is_active(&self) -> bool {
        if self.audience.is_empty() {
            return false;
        }
        self.test_mode || self.enabled
    }
}
