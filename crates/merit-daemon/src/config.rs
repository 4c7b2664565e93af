//! Configuration file management.

use std::collections::HashSet;
use std::path::PathBuf;

use merit_types::community::CommunitySettings;
use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// RPC settings.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Read-only community settings served by this daemon.
    #[serde(default)]
    pub communities: Vec<CommunitySettings>,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// RPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Socket file name inside the data directory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    /// Per-subscriber event buffer.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Configuration rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("community id '{0}' is configured twice")]
    DuplicateCommunity(String),

    #[error("community id '{0}' is reserved for global wallets")]
    ReservedCommunityId(String),

    #[error("community '{community}': {source}")]
    InvalidRules {
        community: String,
        #[source]
        source: merit_permissions::PermissionError,
    },

    #[error("community '{0}': tappalka comparisons_required must be at least 1")]
    ZeroComparisons(String),
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_socket_name() -> String {
    "merit.sock".to_string()
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot serve consistently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for community in &self.communities {
            if merit_types::is_global(&community.id) {
                return Err(ConfigError::ReservedCommunityId(community.id.clone()));
            }
            if !seen.insert(community.id.as_str()) {
                return Err(ConfigError::DuplicateCommunity(community.id.clone()));
            }
            merit_permissions::rules::validate_rules(&community.permission_rules).map_err(
                |source| ConfigError::InvalidRules {
                    community: community.id.clone(),
                    source,
                },
            )?;
            if community.tappalka.enabled && community.tappalka.comparisons_required == 0 {
                return Err(ConfigError::ZeroComparisons(community.id.clone()));
            }
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("MERIT_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Merit")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".merit")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/merit"))
}
