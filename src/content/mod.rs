// src/content/mod.rs
//! Content selection: published items inside a delivery window, per
//! language, with category exclusion and minimum-entry backfill.

pub mod excerpt;
pub mod repository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::dispatch::audience::Audience;
use crate::window::DeliveryWindow;

pub use repository::InMemoryContentRepository;

pub const DEFAULT_CONTENT_KIND: &str = "post";

fn default_kind() -> String {
    DEFAULT_CONTENT_KIND.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Publish,
    Draft,
    Pending,
    Future,
    Private,
}

/// Per-item delivery options an editor can attach to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOverrides {
    /// Publishing this item fires a delivery.
    #[serde(default)]
    pub scheduler_active: bool,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub delivery_name: Option<String>,
}

/// Record as the host repository hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContent {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub published_at: NaiveDateTime,
    pub permalink: String,
    #[serde(default)]
    pub lead_image: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub taxonomies: Vec<String>,
    #[serde(default)]
    pub overrides: DeliveryOverrides,
}

/// Normalized snapshot used for one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub truncated_body: String,
    pub permalink: String,
    pub published_at: NaiveDateTime,
    pub lead_image: Option<String>,
}

impl From<RawContent> for ContentItem {
    fn from(raw: RawContent) -> Self {
        let truncated_body = excerpt::truncate_body(&raw.body);
        let excerpt = raw
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| truncated_body.clone());
        Self {
            id: raw.id,
            title: raw.title,
            body: raw.body,
            excerpt,
            truncated_body,
            permalink: raw.permalink,
            published_at: raw.published_at,
            lead_image: raw.lead_image.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Host content repository.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Published items inside `window`, newest first, without the excluded categories.
    async fn query(
        &self,
        window: &DeliveryWindow,
        language: &str,
        excluded: &[i64],
    ) -> Result<Vec<RawContent>>;

    /// Most recent published items older than `before`, skipping the first `offset`.
    async fn query_backfill(
        &self,
        language: &str,
        before: NaiveDateTime,
        offset: usize,
        count: usize,
        excluded: &[i64],
    ) -> Result<Vec<RawContent>>;

    async fn get_by_id(&self, id: u64) -> Result<Option<RawContent>>;

    /// Configured site languages in their fixed order.
    async fn languages(&self) -> Result<Vec<String>>;
}

/// Category filter in the host convention: every id is negated.
pub fn exclusion_filter(excluded: &[i64]) -> Vec<i64> {
    excluded.iter().map(|id| -id.abs()).collect()
}

/// Window query plus backfill, normalized.
pub struct ContentSelector<'a, R: ContentRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: ContentRepository + ?Sized> ContentSelector<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    pub async fn select(
        &self,
        window: &DeliveryWindow,
        language: &str,
        excluded: &[i64],
        minimum: Option<usize>,
    ) -> Result<Vec<ContentItem>> {
        let filter = exclusion_filter(excluded);
        let mut found = self.repo.query(window, language, &filter).await?;
        let in_window = found.len();

        if let Some(min) = minimum.filter(|m| *m > in_window) {
            // Everything older than the window start is outside the window
            // already, so the backfill page starts at its head.
            let extra = self
                .repo
                .query_backfill(language, window.from, 0, min - in_window, &filter)
                .await?;
            let mut seen: HashSet<u64> = found.iter().map(|i| i.id).collect();
            let fetched = extra.len();
            found.extend(extra.into_iter().filter(|i| seen.insert(i.id)));
            debug!(
                target: "scheduler",
                language,
                in_window,
                backfill = found.len() - in_window,
                dropped = fetched + in_window - found.len(),
                "backfilled content"
            );
        }

        Ok(found.into_iter().map(ContentItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_filter_negates_ids() {
        assert_eq!(exclusion_filter(&[3, -4, 10]), vec![-3, -4, -10]);
    }

    #[test]
    fn stored_excerpt_wins_over_truncation() {
        let raw = RawContent {
            id: 1,
            title: "T".into(),
            body: "<p>Body</p>".into(),
            excerpt: Some("Hand written".into()),
            published_at: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            permalink: "https://x/1".into(),
            lead_image: Some("  ".into()),
            language: None,
            status: ContentStatus::Publish,
            kind: "post".into(),
            category_ids: vec![],
            taxonomies: vec![],
            overrides: DeliveryOverrides::default(),
        };
        let item = ContentItem::from(raw);
        assert_eq!(item.excerpt, "Hand written");
        assert_eq!(item.truncated_body, "Body");
        assert_eq!(item.lead_image, None);
    }
}
