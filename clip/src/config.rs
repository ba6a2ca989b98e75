//! Configuration management
//!
//! Loaded from a TOML file; every section and field falls back to its
//! default when absent.

use crate::controller::DEFAULT_SCAN_LIMIT;
use crate::history::DEFAULT_CAPACITY;
use crate::interface::TrimMode;
use crate::similarity::DEFAULT_MAX_SIMILARITY_LEN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Polling below this is rejected
const MIN_REFRESH_INTERVAL_MS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub display: DisplayConfig,
    /// Whitespace trimming applied to captured text
    pub trim_mode: TrimMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries kept before eviction starts
    pub max_size: usize,
    /// Record clipboard changes at all
    pub enabled: bool,
    /// Recent entries checked for near-duplicates; 0 disables folding
    pub similarity_scan_limit: usize,
    /// Characters compared when measuring similarity
    pub max_similarity_len: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CAPACITY,
            enabled: true,
            similarity_scan_limit: DEFAULT_SCAN_LIMIT,
            max_similarity_len: DEFAULT_MAX_SIMILARITY_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub refresh_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { refresh_interval_ms: 250 }
    }
}

impl DaemonConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; the platform data directory when unset
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_storage_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Characters of each entry shown in menus and listings
    pub characters: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { characters: 80 }
    }
}

/// `<data dir>/clip/history.db`, or the working directory when the platform
/// has no data directory
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clip")
        .join("history.db")
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_size == 0 {
            return Err(ConfigError::Invalid("history.max_size must be at least 1".into()));
        }
        if self.daemon.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "daemon.refresh_interval_ms must be at least {}",
                MIN_REFRESH_INTERVAL_MS
            )));
        }
        if self.display.characters == 0 {
            return Err(ConfigError::Invalid("display.characters must be at least 1".into()));
        }
        Ok(())
    }
}
