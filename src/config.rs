//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::notify::HubConfig;
use crate::storage::Filter;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Scoping filter in text form; empty matches everything
    #[serde(default)]
    pub filter: String,

    /// Newest samples kept per timeseries; unset keeps all
    pub max_samples: Option<usize>,

    /// Capacity of the change broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    crate::cache::engine::DEFAULT_CHANGE_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            filter: String::new(),
            max_samples: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl CacheConfig {
    /// Parse the filter text
    pub fn parse_filter(&self) -> Result<Filter, ConfigError> {
        Filter::parse(&self.filter).map_err(|e| ConfigError::Invalid {
            field: "cache.filter".to_string(),
            error: e.to_string(),
        })
    }
}

/// In-memory store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_first_id")]
    pub first_id: u64,

    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,

    #[serde(default)]
    pub log_notifications: bool,
}

fn default_first_id() -> u64 {
    1
}

fn default_max_subscriptions() -> usize {
    1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            first_id: default_first_id(),
            max_subscriptions: default_max_subscriptions(),
            log_notifications: false,
        }
    }
}

impl From<&StoreConfig> for crate::storage::StoreConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            first_id: config.first_id,
            hub: HubConfig {
                max_subscriptions: config.max_subscriptions,
            },
            log_notifications: config.log_notifications,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tagstore").join("config.toml")),
            Some(PathBuf::from("/etc/tagstore/config.toml")),
            Some(PathBuf::from("./tagstore.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check values that deserialization alone cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.parse_filter()?;

        if self.cache.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.channel_capacity".to_string(),
                error: "must be greater than zero".to_string(),
            });
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid {
                field: "logging.format".to_string(),
                error: format!("expected \"pretty\" or \"json\", got {:?}", other),
            }),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Cache overrides
        if let Some(filter) = lookup("TAGSTORE_FILTER") {
            self.cache.filter = filter;
        }
        if let Some(max) = lookup("TAGSTORE_MAX_SAMPLES") {
            match max.parse() {
                Ok(n) => self.cache.max_samples = Some(n),
                Err(_) => tracing::warn!(value = %max, "Ignoring invalid TAGSTORE_MAX_SAMPLES"),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("TAGSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TAGSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: String, error: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tagstore Configuration
#
# Environment variables override these settings:
# - TAGSTORE_FILTER
# - TAGSTORE_MAX_SAMPLES
# - TAGSTORE_LOG_LEVEL
# - TAGSTORE_LOG_FORMAT

[cache]
# Tagset patterns the cache mirrors, ';' separated (empty = everything)
filter = ""

# Newest samples kept per timeseries (unset = keep all)
# max_samples = 1000

# Capacity of the change notification channel
channel_capacity = 256

[store]
# First event id handed out
first_id = 1

# Maximum concurrent notification subscriptions
max_subscriptions = 1024

# Trace every published notification
log_notifications = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/tagstore/tagstore.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.cache.filter, "");
        assert_eq!(config.cache.max_samples, None);
        assert_eq!(config.cache.channel_capacity, 256);
        assert_eq!(config.store.first_id, 1);
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[cache]\nfilter = \"color=red;color=blue\"\nmax_samples = 50\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cache.max_samples, Some(50));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cache.parse_filter().unwrap().patterns.len(), 2);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[cache\nfilter =").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.cache.filter = "a,,b".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "cache.filter"
        ));

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TAGSTORE_FILTER", "kind=temp"),
            ("TAGSTORE_MAX_SAMPLES", "10"),
            ("TAGSTORE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.cache.filter, "kind=temp");
        assert_eq!(config.cache.max_samples, Some(10));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_store_config_conversion() {
        let config = StoreConfig {
            first_id: 7,
            max_subscriptions: 3,
            log_notifications: true,
        };
        let store: crate::storage::StoreConfig = (&config).into();
        assert_eq!(store.first_id, 7);
        assert_eq!(store.hub.max_subscriptions, 3);
        assert!(store.log_notifications);
    }
}
