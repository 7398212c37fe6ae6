//! # Newsletter Engine
//! Facade over the scheduler, the single-post path, subscriptions and
//! provisioning. Callers pass "now" in; nothing here reads the clock.

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::info;

use crate::config::{keys, AppConfig, JsonFileSettingsStore, SettingsStore};
use crate::content::repository::InMemoryContentRepository;
use crate::content::{ContentRepository, ContentStatus};
use crate::cron::{self, CronOutcome};
use crate::dispatch::{Delivered, Dispatcher};
use crate::error::DispatchError;
use crate::manual::{ManualDelivery, TransitionOutcome};
use crate::provision::{ProvisionReport, Provisioner};
use crate::remote::{DeliveryApi, HttpDeliveryApi};
use crate::render::catalog::TemplateCatalog;
use crate::render::{SiteInfo, TemplateRenderer};
use crate::scheduler::{
    CycleReport, FailurePolicy, RunOptions, ScheduleState, Scheduler, StoreScheduleState,
};
use crate::subscribe::{SubscribeError, Subscriptions};
use crate::window::Frequency;

#[derive(Clone)]
pub struct NewsletterEngine {
    store: Arc<dyn SettingsStore>,
    state: Arc<dyn ScheduleState>,
    renderer: Arc<TemplateRenderer>,
    scheduler: Scheduler,
    manual: ManualDelivery,
    subscriptions: Subscriptions,
    provisioner: Provisioner,
}

impl NewsletterEngine {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        content: Arc<dyn ContentRepository>,
        renderer: TemplateRenderer,
        api: Arc<dyn DeliveryApi>,
        policy: FailurePolicy,
    ) -> Self {
        let renderer = Arc::new(renderer);
        let dispatcher = Dispatcher::new(api.clone());
        let state: Arc<dyn ScheduleState> = Arc::new(StoreScheduleState::new(store.clone()));
        let scheduler = Scheduler::new(
            store.clone(),
            content.clone(),
            renderer.clone(),
            dispatcher.clone(),
            state.clone(),
        )
        .with_policy(policy);
        let manual =
            ManualDelivery::new(store.clone(), content.clone(), renderer.clone(), dispatcher);
        let subscriptions = Subscriptions::new(store.clone(), api.clone());
        let provisioner = Provisioner::new(store.clone(), content, api, &renderer.site().name);
        Self {
            store,
            state,
            renderer,
            scheduler,
            manual,
            subscriptions,
            provisioner,
        }
    }

    /// File-backed settings, JSON content and the HTTP client, as configured.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn SettingsStore> =
            Arc::new(JsonFileSettingsStore::new(cfg.settings_path.clone()));
        let settings = store.load().await.context("loading settings blob")?;

        let content: Arc<dyn ContentRepository> = if cfg.content_path.exists() {
            Arc::new(InMemoryContentRepository::load_from_file(&cfg.content_path)?)
        } else {
            info!(path = %cfg.content_path.display(), "content file missing; starting empty");
            Arc::new(InMemoryContentRepository::default())
        };

        let catalog = TemplateCatalog::new(cfg.template_roots())
            .hide_bundled(settings.is_on(keys::HIDE_SAMPLE_TEMPLATES));
        let site = SiteInfo {
            name: cfg.site_name.clone(),
            url: cfg.site_url.clone(),
            templates_url: cfg.templates_url.clone(),
        };
        let api: Arc<dyn DeliveryApi> = Arc::new(
            HttpDeliveryApi::new(cfg.api_base_url.clone()).with_timeout(cfg.http_timeout_secs),
        );

        Ok(Self::new(
            store,
            content,
            TemplateRenderer::new(catalog, site),
            api,
            cfg.failure_policy,
        ))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Template names operators can pick from.
    pub fn templates(&self) -> Vec<String> {
        self.renderer.catalog().available()
    }

    pub async fn run_cron(&self, now: NaiveDateTime) -> anyhow::Result<CronOutcome> {
        cron::run_cron(&self.scheduler, self.store.as_ref(), now).await
    }

    /// One cadence, bypassing the cron debounce.
    pub async fn run_frequency(
        &self,
        frequency: Frequency,
        now: NaiveDateTime,
        opts: &RunOptions,
    ) -> CycleReport {
        self.scheduler.run(frequency, now, opts).await
    }

    /// Body of the first language that would go out right now.
    pub async fn preview(
        &self,
        frequency: Frequency,
        now: NaiveDateTime,
        template: Option<String>,
        language: Option<String>,
    ) -> CycleReport {
        let opts = RunOptions {
            template,
            language,
            ..RunOptions::preview()
        };
        self.scheduler.run(frequency, now, &opts).await
    }

    pub async fn reset_deliveries(&self) -> Result<usize, DispatchError> {
        let cleared = self.state.reset_all().await?;
        info!(target: "scheduler", cleared, "delivery stamps reset");
        Ok(cleared)
    }

    pub async fn deliver_post(
        &self,
        post_id: u64,
        today: NaiveDate,
        preview: bool,
    ) -> Result<Delivered, DispatchError> {
        self.manual.deliver_post(post_id, today, preview).await
    }

    pub async fn on_status_transition(
        &self,
        post_id: u64,
        old: ContentStatus,
        new: ContentStatus,
        today: NaiveDate,
    ) -> Result<TransitionOutcome, DispatchError> {
        self.manual.on_status_transition(post_id, old, new, today).await
    }

    pub async fn subscribe(
        &self,
        email: &str,
        frequency: Frequency,
        lang: &str,
    ) -> Result<String, SubscribeError> {
        self.subscriptions.subscribe(email, frequency, lang).await
    }

    pub async fn provision_lists(&self, now_unix: i64) -> Result<ProvisionReport, DispatchError> {
        self.provisioner.provision_lists(now_unix).await
    }

    pub async fn provision_campaigns(&self, now_unix: i64) -> Result<ProvisionReport, DispatchError> {
        self.provisioner.provision_campaigns(now_unix).await
    }
}
