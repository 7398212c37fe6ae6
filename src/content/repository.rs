// src/content/repository.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use super::{ContentRepository, ContentStatus, RawContent};
use crate::window::DeliveryWindow;

pub const DEFAULT_LANGUAGE: &str = "es";

#[derive(Debug, Default)]
struct Inner {
    languages: Vec<String>,
    items: Vec<RawContent>,
}

/// Content held in memory, optionally seeded from a JSON export. Items with
/// no language belong to every language.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentRepository {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentFile {
    Full {
        #[serde(default)]
        languages: Vec<String>,
        items: Vec<RawContent>,
    },
    Items(Vec<RawContent>),
}

impl InMemoryContentRepository {
    pub fn new(languages: Vec<String>, items: Vec<RawContent>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { languages, items })),
        }
    }

    /// `{ "languages": [..], "items": [..] }` or a bare item array.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading content from {}", path.display()))?;
        let parsed: ContentFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing content {}", path.display()))?;
        Ok(match parsed {
            ContentFile::Full { languages, items } => Self::new(languages, items),
            ContentFile::Items(items) => Self::new(Vec::new(), items),
        })
    }

    pub fn insert(&self, item: RawContent) {
        let mut g = self.inner.write();
        g.items.retain(|i| i.id != item.id);
        g.items.push(item);
    }

    /// Returns the previous status, `None` when the id is unknown.
    pub fn set_status(&self, id: u64, status: ContentStatus) -> Option<ContentStatus> {
        let mut g = self.inner.write();
        let item = g.items.iter_mut().find(|i| i.id == id)?;
        Some(std::mem::replace(&mut item.status, status))
    }

    fn published_for(&self, language: &str, excluded: &[i64]) -> Vec<RawContent> {
        let g = self.inner.read();
        let mut out: Vec<RawContent> = g
            .items
            .iter()
            .filter(|i| i.status == ContentStatus::Publish)
            .filter(|i| i.language.as_deref().is_none_or(|l| l == language))
            .filter(|i| !i.category_ids.iter().any(|c| excluded.contains(&-c.abs())))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        out
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn query(
        &self,
        window: &DeliveryWindow,
        language: &str,
        excluded: &[i64],
    ) -> Result<Vec<RawContent>> {
        Ok(self
            .published_for(language, excluded)
            .into_iter()
            .filter(|i| window.contains(i.published_at))
            .collect())
    }

    async fn query_backfill(
        &self,
        language: &str,
        before: NaiveDateTime,
        offset: usize,
        count: usize,
        excluded: &[i64],
    ) -> Result<Vec<RawContent>> {
        Ok(self
            .published_for(language, excluded)
            .into_iter()
            .filter(|i| i.published_at < before)
            .skip(offset)
            .take(count)
            .collect())
    }

    async fn get_by_id(&self, id: u64) -> Result<Option<RawContent>> {
        Ok(self.inner.read().items.iter().find(|i| i.id == id).cloned())
    }

    async fn languages(&self) -> Result<Vec<String>> {
        let g = self.inner.read();
        if g.languages.is_empty() {
            return Ok(vec![DEFAULT_LANGUAGE.to_string()]);
        }
        Ok(g.languages.clone())
    }
}
