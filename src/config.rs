//! Configuration management for streamify
//!
//! Handles config file loading/saving and environment overrides.
//! Config is stored at ~/.config/streamify/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stream::session::SessionConfig;

/// Default REST API origin
pub const DEFAULT_API_URL: &str = "https://api.streamhivex.icu";

/// Default media proxy prefix; the encoded source URL is appended to it
pub const DEFAULT_PROXY_URL: &str = "https://api.streamhivex.icu/api/download?url=";

/// Default web front-end, used for the direct-open fallback page
pub const DEFAULT_WEB_URL: &str = "https://streamhivex.icu";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// REST API origin
    pub api_base_url: String,
    /// Media proxy prefix
    pub proxy_base_url: String,
    /// Web front-end origin
    pub web_base_url: String,
    /// Media player binary (mpv)
    pub player: String,
    /// Seconds between progress checkpoints
    pub checkpoint_interval_secs: u64,
    /// Idle time before the controls overlay hides
    pub idle_hide_ms: u64,
    /// Skip forward/backward delta
    pub skip_seconds: u64,
    /// Fraction of duration past which a saved position is not restored
    pub resume_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            proxy_base_url: DEFAULT_PROXY_URL.to_string(),
            web_base_url: DEFAULT_WEB_URL.to_string(),
            player: "mpv".to_string(),
            checkpoint_interval_secs: 30,
            idle_hide_ms: 3000,
            skip_seconds: 15,
            resume_threshold: 0.95,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/streamify/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamify").join("config.toml"))
    }

    /// Load config from the default path, or defaults if not found
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
            .with_env_overrides()
    }

    /// Load config from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Apply STREAMIFY_API_URL / STREAMIFY_PROXY_URL overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("STREAMIFY_API_URL") {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var("STREAMIFY_PROXY_URL") {
            self.proxy_base_url = url;
        }
        self
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Session tuning derived from this config
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            proxy_base_url: self.proxy_base_url.clone(),
            web_base_url: self.web_base_url.clone(),
            checkpoint_interval: Duration::from_secs(self.checkpoint_interval_secs.max(1)),
            idle_timeout: Duration::from_millis(self.idle_hide_ms),
            skip_seconds: self.skip_seconds as f64,
            resume_threshold: self.resume_threshold.clamp(0.0, 1.0),
            ..SessionConfig::default()
        }
    }
}
