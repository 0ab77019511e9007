//! Configuration management for captionist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Error;

/// Global captionist configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Per-category metric bound overrides, keyed by canonical category label.
    #[serde(default)]
    pub bounds: HashMap<String, BoundsOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Database file. Defaults to ~/.captionist/captionist.db
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token budget for persona regeneration.
    #[serde(default = "default_persona_max_tokens")]
    pub persona_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            persona_max_tokens: default_persona_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_digest_interval_secs")]
    pub digest_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            digest_interval_secs: default_digest_interval_secs(),
        }
    }
}

/// Partial metric bounds for one category. Omitted fields keep the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BoundsOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saves_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_length_min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_length_max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_count_max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag_count_max: Option<usize>,
}

fn default_socket_path() -> String {
    "/tmp/captionist_generation.sock".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.3
}

fn default_persona_max_tokens() -> u32 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_digest_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Config {
    /// Load config from ~/.captionist/config.toml
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&Self::path()?)
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to ~/.captionist/config.toml
    pub fn save(&self) -> Result<(), Error> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to global captionist directory (~/.captionist/)
    pub fn global_dir() -> Result<PathBuf, Error> {
        let home = dirs::home_dir().ok_or(Error::HomeDirNotFound)?;
        Ok(home.join(".captionist"))
    }

    /// Path to config file
    pub fn path() -> Result<PathBuf, Error> {
        Ok(Self::global_dir()?.join("config.toml"))
    }

    /// Resolved database path.
    pub fn db_path(&self) -> Result<PathBuf, Error> {
        match &self.storage.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::global_dir()?.join("captionist.db")),
        }
    }
}
