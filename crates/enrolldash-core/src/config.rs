//! Application configuration management.
//!
//! Holds the backend URL and the freshness knobs (polling interval, cache TTL,
//! timeouts, write debouncing).
//!
//! Configuration is stored at `~/.config/enrolldash/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::DEFAULT_CACHE_TTL_MS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "enrolldash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing else is configured (the Flask dev server).
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// 0 disables polling; refresh is then manual only.
    pub poll_interval_secs: u64,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    /// Upper bound on a whole refresh. None leaves it to the transport timeout.
    pub refresh_timeout_secs: Option<u64>,
    /// 0 writes the cache through immediately.
    pub cache_write_debounce_ms: u64,
    pub pause_when_hidden: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval_secs: 0,
            cache_ttl_secs: (DEFAULT_CACHE_TTL_MS / 1000) as u64,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: None,
            cache_write_debounce_ms: 0,
            pause_when_hidden: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        self.refresh_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_write_debounce(&self) -> Option<Duration> {
        (self.cache_write_debounce_ms > 0).then(|| Duration::from_millis(self.cache_write_debounce_ms))
    }
}
