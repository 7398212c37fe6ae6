// src/config/keys.rs
//! Option names in the settings blob. Per-language and per-frequency keys are
//! built from a flat `mdirector_` prefix.

use chrono::Weekday;

use crate::window::Frequency;

pub const API_KEY: &str = "mdirector_api";
pub const API_SECRET: &str = "mdirector_secret";
pub const ACTIVE: &str = "mdirector_active";
pub const USE_TEST_LISTS: &str = "mdirector_use_test_lists";
pub const WEEKLY_DAY: &str = "mdirector_frequency_day";
pub const MINIMUM_ENTRIES: &str = "mdirector_minimum_entries";
pub const EXCLUDE_CATS: &str = "mdirector_exclude_cats";
pub const TEMPLATE_GENERAL: &str = "mdirector_template_general";
pub const HIDE_SAMPLE_TEMPLATES: &str = "mdirector_hide_sample_templates";
pub const LAST_CRON_LAUNCHER: &str = "mdirector_last_cron_launcher";
pub const SCHEDULER_POSTS: &str = "mdirector_scheduler_posts";
pub const SCHEDULER_TAXONOMIES: &str = "mdirector_scheduler_taxonomies";
pub const SCHEDULER_DEFAULT_FROM: &str = "mdirector_scheduler_default_from_name";

/// Audience id family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudienceKind {
    List,
    Segment,
    Group,
}

pub fn frequency_enabled(f: Frequency) -> String {
    format!("mdirector_frequency_{f}")
}

pub fn hour(f: Frequency) -> String {
    format!("mdirector_hour_{f}")
}

pub fn hour_for_lang(f: Frequency, lang: &str) -> String {
    format!("mdirector_hour_{f}_{lang}")
}

pub fn weekday_toggle(day: Weekday) -> String {
    format!(
        "mdirector_daily_weekday_{}",
        day.to_string().to_ascii_lowercase()
    )
}

pub fn last_sent(f: Frequency, lang: &str) -> String {
    format!("mdirector_{f}_sent_{lang}")
}

pub fn subject_type(f: Frequency) -> String {
    format!("mdirector_subject_type_{f}")
}

pub fn subject_fixed(f: Frequency, lang: &str) -> String {
    format!("mdirector_subject_{f}_{lang}")
}

pub fn subject_prefix(f: Frequency, lang: &str) -> String {
    format!("mdirector_subject_dynamic_prefix_{f}_{lang}")
}

pub fn subject_criterion(f: Frequency) -> String {
    format!("mdirector_subject_dynamic_value_{f}")
}

pub fn audience(f: Frequency, kind: AudienceKind, test: bool, lang: &str) -> String {
    let test = if test { "test_" } else { "" };
    match kind {
        AudienceKind::List => format!("mdirector_{f}_list_{test}{lang}"),
        AudienceKind::Segment => format!("mdirector_{f}_list_{test}segment_{lang}"),
        AudienceKind::Group => format!("mdirector_{f}_list_{test}group_{lang}"),
    }
}

pub fn list_name(f: Frequency, lang: &str) -> String {
    format!("mdirector_{f}_list_name_{lang}")
}

pub fn custom_list(f: Frequency, lang: &str) -> String {
    format!("mdirector_{f}_custom_list_{lang}")
}

pub fn campaign(f: Frequency, lang: &str) -> String {
    format!("mdirector_{f}_campaign_{lang}")
}

pub fn campaign_tests(f: Frequency) -> String {
    format!("mdirector_{f}_campaign_tests")
}

pub fn campaign_name(f: Frequency, lang: &str) -> String {
    format!("mdirector_{f}_campaign_name_{lang}")
}

pub fn sender(f: Frequency) -> String {
    format!("mdirector_from_{f}")
}

pub fn template(lang: &str) -> String {
    format!("mdirector_template_{lang}")
}
