// src/window.rs
//! Delivery cadence and the half-open time window a digest covers.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    pub const ALL: [Frequency; 2] = [Frequency::Daily, Frequency::Weekly];

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    pub fn period(self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::days(7),
        }
    }

    /// Subject used when the configured one is blank.
    pub fn default_subject(self) -> &'static str {
        match self {
            Frequency::Daily => "Daily mail",
            Frequency::Weekly => "Weekly mail",
        }
    }

    /// Remote delivery name when the caller supplies none, e.g. `daily_2024_03_15`.
    pub fn delivery_name(self, date: NaiveDate) -> String {
        format!("{}_{}", self.as_str(), date.format("%Y_%m_%d"))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => anyhow::bail!("unknown frequency '{other}'"),
        }
    }
}

/// Configured send hour, `"HH:MM"` in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleHour {
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleHour {
    pub const MIDNIGHT: ScheduleHour = ScheduleHour { hour: 0, minute: 0 };

    /// Lenient parse: blank or malformed input falls back to midnight.
    pub fn parse_or_midnight(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Self::MIDNIGHT)
    }

    pub fn as_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for ScheduleHour {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("expected HH:MM, got '{s}'"))?;
        let hour: u32 = h.trim().parse()?;
        let minute: u32 = m.trim().parse()?;
        if hour > 23 || minute > 59 {
            anyhow::bail!("hour out of range: '{s}'");
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for ScheduleHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// `[from, to)`; `to` is today at the configured hour, `from = to - period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl DeliveryWindow {
    pub fn compute(now: NaiveDateTime, hour: ScheduleHour, frequency: Frequency) -> Self {
        let to = now.date().and_time(hour.as_time());
        Self {
            from: to - frequency.period(),
            to,
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.from && ts < self.to
    }

    /// The scheduled hour has passed.
    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        now >= self.to
    }
}
