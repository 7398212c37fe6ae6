// src/render/subject.rs
use serde::{Deserialize, Serialize};

use crate::config::{keys, Settings};
use crate::content::ContentItem;
use crate::window::Frequency;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectMode {
    #[default]
    Fixed,
    Dynamic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicCriterion {
    #[default]
    FirstPost,
    LastPost,
}

impl DynamicCriterion {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("last_post") => DynamicCriterion::LastPost,
            _ => DynamicCriterion::FirstPost,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConfig {
    pub mode: SubjectMode,
    #[serde(default)]
    pub fixed: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub criterion: DynamicCriterion,
}

impl SubjectConfig {
    pub fn from_settings(settings: &Settings, frequency: Frequency, lang: &str) -> Self {
        let mode = match settings.raw_str(&keys::subject_type(frequency)) {
            Some("dynamic") => SubjectMode::Dynamic,
            _ => SubjectMode::Fixed,
        };
        Self {
            mode,
            fixed: settings
                .raw_str(&keys::subject_fixed(frequency, lang))
                .unwrap_or_default()
                .to_string(),
            prefix: settings
                .raw_str(&keys::subject_prefix(frequency, lang))
                .unwrap_or_default()
                .to_string(),
            criterion: DynamicCriterion::parse(
                settings.raw_str(&keys::subject_criterion(frequency)),
            ),
        }
    }

    pub fn fixed(subject: impl Into<String>) -> Self {
        Self {
            fixed: subject.into(),
            ..Self::default()
        }
    }

    /// Items are taken in fetch order: `FirstPost` reads the last fetched
    /// title, `LastPost` the first one.
    pub fn resolve(&self, items: &[ContentItem], frequency: Frequency) -> String {
        let subject = match self.mode {
            SubjectMode::Fixed => self.fixed.clone(),
            SubjectMode::Dynamic => {
                let title = match self.criterion {
                    DynamicCriterion::FirstPost => items.last(),
                    DynamicCriterion::LastPost => items.first(),
                }
                .map(|i| i.title.as_str())
                .unwrap_or_default();
                format!("{} {}", self.prefix, title)
            }
        };
        if subject.trim().is_empty() {
            frequency.default_subject().to_string()
        } else {
            subject
        }
    }
}
