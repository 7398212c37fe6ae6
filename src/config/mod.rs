// src/config/mod.rs
//! Settings blob access: a flat option map, read as a fresh snapshot and
//! written back whole.

pub mod app;
pub mod keys;
pub mod schedule;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use app::AppConfig;
pub use schedule::ScheduleConfig;
pub use store::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};

pub const OPTION_ON: &str = "yes";
pub const OPTION_OFF: &str = "no";

/// Snapshot of the plugin settings blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; anything else is rejected.
    pub fn from_json(v: Value) -> anyhow::Result<Self> {
        match v {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::default()),
            other => anyhow::bail!("settings must be a JSON object, got {other}"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Trimmed, non-empty textual value. Numbers are rendered as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Raw string value, untrimmed (subjects keep their spacing).
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// `"yes"` or `true`.
    pub fn is_on(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::String(s)) => s.eq_ignore_ascii_case(OPTION_ON),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Present and explicitly not `"yes"`.
    pub fn is_set_off(&self, key: &str) -> bool {
        self.0.contains_key(key) && !self.is_on(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Identifier list; accepts an array or a single scalar, drops blanks.
    pub fn ids(&self, key: &str) -> Vec<String> {
        fn scalar(v: &Value) -> Option<String> {
            match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }
        match self.0.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
            Some(v) => scalar(v).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Store an explicit null, the way a reset leaves a key behind.
    pub fn clear(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), Value::Null);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: Settings) {
        self.0.extend(other.0);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let key = self.text(keys::API_KEY)?;
        let secret = self.text(keys::API_SECRET)?;
        Some(Credentials { key, secret })
    }

    /// Credentials present and the engine not switched off.
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some() && !self.is_set_off(keys::ACTIVE)
    }

    pub fn use_test_lists(&self) -> bool {
        self.is_on(keys::USE_TEST_LISTS)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Settings {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// API key pair; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &crate::logging::SECRET_MASK)
            .finish()
    }
}
