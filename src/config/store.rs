// src/config/store.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Settings;

/// Persisted settings blob. `load` returns a fresh snapshot, `save` replaces
/// the whole blob.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// Read a fresh snapshot, apply `f`, write back the merged copy.
pub async fn update<S, F>(store: &S, f: F) -> Result<Settings>
where
    S: SettingsStore + ?Sized,
    F: FnOnce(&mut Settings),
{
    let mut s = store.load().await?;
    f(&mut s);
    store.save(&s).await?;
    Ok(s)
}

#[async_trait]
impl<T: SettingsStore + ?Sized> SettingsStore for Arc<T> {
    async fn load(&self) -> Result<Settings> {
        (**self).load().await
    }
    async fn save(&self, settings: &Settings) -> Result<()> {
        (**self).save(settings).await
    }
}

/// In-process store; clones share the same blob.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<Settings>>,
    saves: Arc<Mutex<usize>>,
}

impl MemorySettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
            saves: Arc::default(),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Settings> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        *self.inner.lock() = settings.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// JSON object on disk. A missing file reads as empty settings.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Settings::default()),
            Ok(raw) => {
                let v: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("parsing settings {}", self.path.display()))?;
                Settings::from_json(v)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => {
                Err(e).with_context(|| format!("reading settings {}", self.path.display()))
            }
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;

    #[tokio::test]
    async fn file_store_round_trips_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettingsStore::new(dir.path().join("nested/settings.json"));
        assert!(store.load().await.unwrap().is_empty());

        let mut s = Settings::new();
        s.set(keys::API_KEY, "k");
        s.set("mdirector_daily_list_es", serde_json::json!([5, 7]));
        store.save(&s).await.unwrap();

        let back = store.load().await.unwrap();
        assert_eq!(back, s);
    }

    #[tokio::test]
    async fn update_merges_into_fresh_snapshot() {
        let store = MemorySettingsStore::default();
        update(&store, |s| s.set(keys::MINIMUM_ENTRIES, 3))
            .await
            .unwrap();
        update(&store, |s| s.set(keys::API_KEY, "k")).await.unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.int(keys::MINIMUM_ENTRIES), Some(3));
        assert_eq!(snap.text(keys::API_KEY).as_deref(), Some("k"));
        assert_eq!(store.save_count(), 2);
    }
}
