//! Configuration loading, validation, and management for Emberchat.
//!
//! Loads configuration from `~/.emberchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `~/.emberchat/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the model backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Generation timeout in seconds (also the HTTP client timeout)
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Connectivity probe interval in seconds
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Attachment size limit in bytes
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_backend_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma3:4b".into()
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_probe_interval_secs() -> u64 {
    10
}
fn default_max_attachment_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            default_model: default_model(),
            generation_timeout_secs: default_generation_timeout_secs(),
            probe_interval_secs: default_probe_interval_secs(),
            max_attachment_bytes: default_max_attachment_bytes(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Defaults to `<data dir>/chat.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Directory for persisted image attachments.
    /// Defaults to `<data dir>/images`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            images_dir: None,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration: file, then environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if let Ok(url) = std::env::var("EMBERCHAT_BACKEND_URL") {
            config.backend_url = url;
        }
        if let Ok(model) = std::env::var("EMBERCHAT_MODEL") {
            config.default_model = model;
        }
        if let Ok(db) = std::env::var("EMBERCHAT_DB") {
            config.storage.database_path = Some(PathBuf::from(db));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path. Missing file = defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the loaded settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.is_empty() {
            return Err(ConfigError::Invalid("backend_url must not be empty".into()));
        }
        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "backend_url must be an http(s) URL, got '{}'",
                self.backend_url
            )));
        }
        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "generation_timeout_secs must be positive".into(),
            ));
        }
        if self.probe_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe_interval_secs must be positive".into(),
            ));
        }
        if self.max_attachment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_attachment_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The config directory: `~/.emberchat`.
    pub fn config_dir() -> PathBuf {
        home_dir().join(".emberchat")
    }

    /// The data directory: `~/.emberchat/data`.
    pub fn data_dir() -> PathBuf {
        Self::config_dir().join("data")
    }

    /// Resolved SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("chat.db"))
    }

    /// Resolved images directory.
    pub fn images_dir(&self) -> PathBuf {
        self.storage
            .images_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("images"))
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
