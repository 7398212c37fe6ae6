// src/provision.rs
//! One-shot creation of remote lists and campaigns, one per language and
//! cadence, with the returned ids written back into the settings blob.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::keys::{self, AudienceKind};
use crate::config::store::update;
use crate::config::{Credentials, SettingsStore};
use crate::content::ContentRepository;
use crate::error::DispatchError;
use crate::remote::DeliveryApi;
use crate::window::Frequency;

const SEPARATOR: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    List,
    Campaign,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub frequency: Frequency,
    pub language: String,
    pub name: String,
    pub id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub kind: ResourceKind,
    pub items: Vec<Provisioned>,
}

impl ProvisionReport {
    pub fn created(&self) -> usize {
        self.items.iter().filter(|i| i.id.is_some()).count()
    }
}

/// Lowercase, alphanumerics kept, every other run collapsed to one dash.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with(SEPARATOR) {
            out.push(SEPARATOR);
        }
    }
    out.trim_end_matches(SEPARATOR).to_string()
}

/// `<site-slug>-<frequency>-<lang>`, plus `-<unix>` when taken remotely.
pub fn resource_name(
    site_slug: &str,
    frequency: Frequency,
    lang: &str,
    taken: &HashSet<String>,
    now_unix: i64,
) -> String {
    let base = format!("{site_slug}{SEPARATOR}{frequency}{SEPARATOR}{lang}");
    if taken.contains(&base) {
        format!("{base}{SEPARATOR}{now_unix}")
    } else {
        base
    }
}

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn SettingsStore>,
    content: Arc<dyn ContentRepository>,
    api: Arc<dyn DeliveryApi>,
    site_slug: String,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        content: Arc<dyn ContentRepository>,
        api: Arc<dyn DeliveryApi>,
        site_name: &str,
    ) -> Self {
        Self {
            store,
            content,
            api,
            site_slug: slugify(site_name),
        }
    }

    async fn credentials(&self) -> Result<Credentials, DispatchError> {
        let settings = self.store.load().await?;
        match settings.credentials() {
            Some(c) if settings.is_configured() => Ok(c),
            _ => Err(DispatchError::ConfigurationIncomplete),
        }
    }

    pub async fn provision_lists(&self, now_unix: i64) -> Result<ProvisionReport, DispatchError> {
        let creds = self.credentials().await?;
        let taken: HashSet<String> = self
            .api
            .lists(&creds)
            .await?
            .into_iter()
            .map(|l| l.name)
            .collect();
        self.provision(ResourceKind::List, &creds, &taken, now_unix).await
    }

    pub async fn provision_campaigns(&self, now_unix: i64) -> Result<ProvisionReport, DispatchError> {
        let creds = self.credentials().await?;
        let taken: HashSet<String> = self
            .api
            .campaigns(&creds)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        self.provision(ResourceKind::Campaign, &creds, &taken, now_unix).await
    }

    async fn provision(
        &self,
        kind: ResourceKind,
        creds: &Credentials,
        taken: &HashSet<String>,
        now_unix: i64,
    ) -> Result<ProvisionReport, DispatchError> {
        let languages = self.content.languages().await?;
        let mut items = Vec::new();

        for frequency in Frequency::ALL {
            for lang in &languages {
                let name = resource_name(&self.site_slug, frequency, lang, taken, now_unix);
                let created = match kind {
                    ResourceKind::List => self.api.create_list(creds, &name).await,
                    ResourceKind::Campaign => self.api.create_campaign(creds, &name).await,
                };
                let (id, error) = match created {
                    Ok(id) => {
                        info!(target: "provision", ?kind, %frequency, lang = %lang, name = %name, id = %id, "created");
                        (Some(id), None)
                    }
                    Err(e) => {
                        warn!(target: "provision", ?kind, %frequency, lang = %lang, name = %name, error = %e, "creation failed");
                        (None, Some(e.to_string()))
                    }
                };
                items.push(Provisioned {
                    frequency,
                    language: lang.clone(),
                    name,
                    id,
                    error,
                });
            }
        }

        update(self.store.as_ref(), |s| {
            for item in &items {
                let Some(id) = &item.id else { continue };
                let (id_key, name_key) = match kind {
                    ResourceKind::List => (
                        keys::audience(item.frequency, AudienceKind::List, false, &item.language),
                        keys::list_name(item.frequency, &item.language),
                    ),
                    ResourceKind::Campaign => (
                        keys::campaign(item.frequency, &item.language),
                        keys::campaign_name(item.frequency, &item.language),
                    ),
                };
                s.set(id_key, id.clone());
                s.set(name_key, item.name.clone());
            }
        })
        .await?;

        Ok(ProvisionReport { kind, items })
    }
}
