// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::scheduler::FailurePolicy;

pub const ENV_PATH: &str = "NEWSLETTER_CONFIG_PATH";
pub const ENV_API_BASE: &str = "MDIRECTOR_API_BASE";
pub const DEFAULT_PATH: &str = "config/newsletter.toml";
pub const DEFAULT_API_BASE: &str = "http://www.mdirector.com";

fn default_settings_path() -> PathBuf {
    PathBuf::from("data/settings.json")
}
fn default_content_path() -> PathBuf {
    PathBuf::from("data/content.json")
}
fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_templates_url() -> String {
    "/templates".to_string()
}
fn default_site_name() -> String {
    "Newsletter".to_string()
}
fn default_site_url() -> String {
    "http://localhost".to_string()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_cron_interval() -> u64 {
    1800
}
fn default_http_timeout() -> u64 {
    10
}

/// Process-level parameters. The per-site options live in the settings blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    #[serde(default = "default_content_path")]
    pub content_path: PathBuf,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    /// Searched before `templates_dir`, first match wins.
    #[serde(default)]
    pub custom_template_dirs: Vec<PathBuf>,
    #[serde(default = "default_templates_url")]
    pub templates_url: String,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_cron_interval")]
    pub cron_interval_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            content_path: default_content_path(),
            templates_dir: default_templates_dir(),
            custom_template_dirs: Vec::new(),
            templates_url: default_templates_url(),
            site_name: default_site_name(),
            site_url: default_site_url(),
            api_base_url: default_api_base(),
            cron_interval_secs: default_cron_interval(),
            http_timeout_secs: default_http_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing app config {}", path.display()))?;
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// 1) $NEWSLETTER_CONFIG_PATH
    /// 2) config/newsletter.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from(DEFAULT_PATH);
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(base) = env::var(ENV_API_BASE) {
            if !base.trim().is_empty() {
                self.api_base_url = base.trim().to_string();
            }
        }
    }

    fn sanitize(&mut self) {
        if self.cron_interval_secs == 0 {
            self.cron_interval_secs = default_cron_interval();
        }
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = default_http_timeout();
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
    }

    /// Template search path: custom directories first, bundled last.
    pub fn template_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.custom_template_dirs.clone();
        roots.push(self.templates_dir.clone());
        roots
    }
}
