use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a config file is read explicitly.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub runtime: RuntimeConfig,
    pub dice: DiceConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

/// Component runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base URL that component module locations resolve against.
    pub asset_base_url: String,
    /// Timeout for a single resource fetch in milliseconds.
    pub fetch_timeout_ms: u64,
}

/// Dice roller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiceConfig {
    /// Roll history entries kept by a dice roller unless its
    /// `max-history` attribute says otherwise.
    pub history_limit: usize,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
}

/// UI timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How long a validation message stays visible.
    pub validation_message_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Directory for daily-rolling JSON logs; stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            asset_base_url: "app://localhost/".to_string(),
            fetch_timeout_ms: 10_000,
        }
    }
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            seed: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            validation_message_ms: 3_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            log_dir: None,
        }
    }
}

impl RuntimeConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl UiConfig {
    pub fn validation_message_duration(&self) -> Duration {
        Duration::from_millis(self.validation_message_ms)
    }
}

impl DashboardConfig {
    /// Load configuration from `~/.config/gm-dashboard/config.toml`.
    /// Returns `Default` if the file is missing or unparseable.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match Self::load_from(&config_path) {
            Ok(config) => {
                log::info!("Loaded config from {}", config_path.display());
                config
            }
            Err(ConfigError::Io { .. }) => {
                log::debug!("No config file at {}, using defaults", config_path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("{} ({}), using defaults", e, config_path.display());
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("gm-dashboard").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
