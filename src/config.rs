//! Configuration management for streamhub
//!
//! Config is stored at ~/.config/streamhub/config.toml. A few settings can be
//! overridden from the environment so tokens stay out of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::addon::DebridSettings;
use crate::api::AddonKind;
use crate::models::Quality;

/// Comma-separated provider list
pub const ENV_PROVIDERS: &str = "STREAMHUB_PROVIDERS";
pub const ENV_DEBRID_TOKEN: &str = "DEBRID_TOKEN";
pub const ENV_TMDB_API_KEY: &str = "TMDB_API_KEY";

/// User-declared Stremio addon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonConfig {
    pub name: String,
    pub url: String,
    /// Explicit config encoding; sniffed from name and URL when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AddonKind>,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enabled providers, queried and merged in this order
    pub providers: Vec<String>,
    /// Debrid service identifier, e.g. `realdebrid`
    pub debrid_service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debrid_token: Option<String>,
    /// Indexers passed through to Torrentio and Comet
    pub indexers: Vec<String>,
    /// Needed by the scrape providers to resolve TMDB ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrentio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mediafusion_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zilean_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoembed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vidsrc_url: Option<String>,

    /// Language or region code steering AutoEmbed server selection
    pub language: String,
    /// Quality cap for best-stream selection (2160, 1080, 720, 480)
    pub max_quality: u32,

    /// Custom addons, referenced by name from `providers`
    pub addons: Vec<AddonConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: vec!["torrentio".to_string()],
            debrid_service: "realdebrid".to_string(),
            debrid_token: None,
            indexers: Vec::new(),
            tmdb_api_key: None,
            torrentio_url: None,
            comet_url: None,
            mediafusion_url: None,
            zilean_url: None,
            autoembed_url: None,
            vidsrc_url: None,
            language: "en".to_string(),
            max_quality: Quality::FHD1080p.value(),
            addons: Vec::new(),
        }
    }
}

impl Config {
    /// Get config file path (~/.config/streamhub/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamhub").join("config.toml"))
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
            .with_env_overrides()
    }

    /// Load config from an explicit path; a missing file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Apply environment variables on top of file values
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(list) = non_empty(ENV_PROVIDERS) {
            self.providers = split_list(&list);
        }
        if let Some(token) = non_empty(ENV_DEBRID_TOKEN) {
            self.debrid_token = Some(token.trim().to_string());
        }
        if let Some(key) = non_empty(ENV_TMDB_API_KEY) {
            self.tmdb_api_key = Some(key.trim().to_string());
        }
        self
    }

    /// Debrid credentials as embedded into addon URLs
    pub fn debrid_settings(&self) -> DebridSettings {
        DebridSettings {
            service: self.debrid_service.clone(),
            token: self.debrid_token.clone().unwrap_or_default(),
            indexers: self.indexers.clone(),
        }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
