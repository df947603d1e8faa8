//! Structured logging configuration.
//!
//! Loader events carry structured fields (`keys`, `chunks`, `index`,
//! `error`), so JSON output keeps them machine-readable:
//!
//! ```json
//! {"timestamp":"...","level":"WARN","fields":{"message":"skipping record that failed to load","index":1,"error":"..."},"target":"relbatch_domain::mapper"}
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use relbatch_resolver::config::RelbatchConfig;
//! use relbatch_resolver::observability::{init_logging, LoggingConfig};
//!
//! let config = RelbatchConfig::from_env()?;
//! init_logging(LoggingConfig::from_settings(&config.logging));
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to use JSON format (true) or text format (false)
    pub json_format: bool,
    /// The default log level if RUST_LOG is not set
    pub default_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
        }
    }
}

impl LoggingConfig {
    /// Builds a logging configuration from the `logging` config section.
    ///
    /// An unparseable level falls back to INFO; `RelbatchConfig::validate`
    /// rejects those before this point.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            json_format: settings.json,
            default_level: settings.level.parse().unwrap_or(Level::INFO),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }
}

/// Initialize the global logging subscriber.
///
/// Call once at startup. Later calls are ignored because the subscriber is
/// global.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_target(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Creates a JSON subscriber writing to `writer`, for capturing loader logs
/// in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
