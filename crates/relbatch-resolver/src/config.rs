//! Configuration management for relationship loaders.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use relbatch_resolver::config::RelbatchConfig;
//!
//! // Load from file with env overrides
//! let config = RelbatchConfig::load("relbatch.yaml")?;
//!
//! // Or load from environment only
//! let config = RelbatchConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use relbatch_domain::coalescer::CoalescerConfig;
use relbatch_domain::window::DEFAULT_PER_PAGE;

const ENV_PREFIX: &str = "RELBATCH";

/// Loader configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RelbatchConfig {
    /// Batch dispatch settings
    #[serde(default)]
    pub batch: BatchSettings,

    /// Windowing defaults
    #[serde(default)]
    pub pagination: PaginationSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Batch dispatch settings.
///
/// Environment variables use the `RELBATCH_` prefix and `__` as the nested
/// key separator:
///
/// - `RELBATCH_BATCH__CACHE_ENABLED=false` - Refetch keys on every dispatch
/// - `RELBATCH_BATCH__MAX_BATCH_SIZE=500` - Split larger dispatches
/// - `RELBATCH_BATCH__DELAY_MS=2` - Widen the coalescing window
///
/// # Example YAML Configuration
///
/// ```yaml
/// batch:
///   cache_enabled: true
///   max_batch_size: 500
///   delay_ms: 2
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BatchSettings {
    /// Keep resolved records for the lifetime of the request.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum keys per batch fetch call. Unbounded when absent.
    #[serde(default)]
    pub max_batch_size: Option<usize>,

    /// Extra coalescing time in milliseconds. A single scheduler yield when absent.
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_batch_size: None,
            delay_ms: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Windowing defaults applied when a request leaves them out.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PaginationSettings {
    /// Page size for page/perPage windows
    #[serde(default = "default_per_page")]
    pub default_per_page: usize,

    /// Limit for offset/limit windows. Unbounded when absent.
    #[serde(default)]
    pub default_limit: Option<usize>,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            default_limit: None,
        }
    }
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl RelbatchConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// For example `RELBATCH_PAGINATION__DEFAULT_PER_PAGE=50` overrides
    /// `pagination.default_per_page`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&RelbatchConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let loaded: RelbatchConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&RelbatchConfig::default())?)
            .add_source(env_source())
            .build()?;

        let loaded: RelbatchConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.batch.max_batch_size == Some(0) {
            return Err(ConfigLoadError::Invalid {
                message: "batch.max_batch_size must be greater than 0".to_string(),
            });
        }

        if self.pagination.default_per_page == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "pagination.default_per_page must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }

    /// Coalescer settings derived from the `batch` section.
    pub fn coalescer_config(&self) -> CoalescerConfig {
        let mut config = CoalescerConfig::default().with_cache(self.batch.cache_enabled);
        if let Some(max) = self.batch.max_batch_size {
            config = config.with_max_batch_size(max);
        }
        if let Some(delay) = self.batch.delay_ms {
            config = config.with_delay(Duration::from_millis(delay));
        }
        config
    }
}

// RELBATCH_BATCH__MAX_BATCH_SIZE -> batch.max_batch_size
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
