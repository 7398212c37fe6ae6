// src/dispatch/audience.rs
//! Audience selection: list, segment and group ids merged into the remote
//! token array.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::keys::{self, AudienceKind};
use crate::config::Settings;
use crate::window::Frequency;

pub const LIST_PREFIX: &str = "LIST-";
pub const GROUP_PREFIX: &str = "SEG_GRU-";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Audience {
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.segments.is_empty() && self.groups.is_empty()
    }

    /// Stored audience for one language and frequency. `test` picks the
    /// `_test_` variant as a whole.
    pub fn from_settings(settings: &Settings, frequency: Frequency, lang: &str, test: bool) -> Self {
        Self {
            lists: settings.ids(&keys::audience(frequency, AudienceKind::List, test, lang)),
            segments: settings.ids(&keys::audience(frequency, AudienceKind::Segment, test, lang)),
            groups: settings.ids(&keys::audience(frequency, AudienceKind::Group, test, lang)),
        }
    }

    /// Stored audience honouring the global test-mode flag.
    pub fn configured(settings: &Settings, frequency: Frequency, lang: &str) -> Self {
        Self::from_settings(settings, frequency, lang, settings.use_test_lists())
    }

    /// Explicit selection wins; an empty one falls back to `fallback` whole.
    pub fn or_fallback(self, fallback: impl FnOnce() -> Audience) -> Audience {
        if self.is_empty() {
            fallback()
        } else {
            self
        }
    }

    /// Lists, then segments, then groups. Numeric segment ids go out as
    /// numbers, everything else as strings.
    pub fn tokens(&self) -> Vec<Value> {
        let lists = self
            .lists
            .iter()
            .map(|id| Value::String(format!("{LIST_PREFIX}{id}")));
        let segments = self.segments.iter().map(|id| match id.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(id.clone()),
        });
        let groups = self
            .groups
            .iter()
            .map(|id| Value::String(format!("{GROUP_PREFIX}{id}")));
        lists.chain(segments).chain(groups).collect()
    }
}
