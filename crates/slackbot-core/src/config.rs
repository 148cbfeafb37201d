//! Bot configuration
//!
//! Loaded from a TOML file; every section is optional:
//!
//! ```toml
//! allowed_users = ["U012AB3CD"]
//!
//! [storage]
//! backend = "redb"            # memory | file | redb
//! path = "/var/lib/slackbot/slackbot.db"
//!
//! [logging]
//! level = "info"
//! directory = "/var/log/slackbot"
//!
//! [dispatch]
//! inbound_buffer = 256
//! drain_timeout_secs = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slackbot_storage::BackendKind;
use slackbot_storage::paths;
use thiserror::Error;

const DEFAULT_INBOUND_BUFFER: usize = 256;
const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";
const FILE_STORAGE_DIR: &str = "storage";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Memory,
    File,
    #[default]
    Redb,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "redb" => Ok(Self::Redb),
            other => Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}' (expected memory, file or redb)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Database file (redb) or root directory (file); defaults below the data dir
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the backend to open, filling in default locations.
    pub fn backend_kind(&self) -> anyhow::Result<BackendKind> {
        let kind = match self.backend {
            StorageBackendKind::Memory => BackendKind::Memory,
            StorageBackendKind::File => BackendKind::File(match &self.path {
                Some(path) => path.clone(),
                None => paths::resolve_data_dir()?.join(FILE_STORAGE_DIR),
            }),
            StorageBackendKind::Redb => BackendKind::Redb(match &self.path {
                Some(path) => path.clone(),
                None => paths::default_db_path()?,
            }),
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Write daily-rotated log files here instead of stderr
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the inbound message channel
    pub inbound_buffer: usize,
    /// How long shutdown waits for in-flight tasks
    pub drain_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inbound_buffer: DEFAULT_INBOUND_BUFFER,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }
}

impl DispatchConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// User IDs allowed to talk to the bot; empty allows everyone
    pub allowed_users: Vec<String>,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
}

impl BotConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, see [`paths::default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        match paths::default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.inbound_buffer == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.inbound_buffer must be at least 1".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if let Some(user) = self.allowed_users.iter().find(|u| u.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "allowed_users contains an empty entry: '{}'",
                user
            )));
        }

        if self.storage.backend == StorageBackendKind::Memory && self.storage.path.is_some() {
            return Err(ConfigError::Invalid(
                "storage.path cannot be used with the memory backend".to_string(),
            ));
        }

        Ok(())
    }
}
