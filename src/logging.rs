//! Logging setup
//!
//! Installs a global `tracing` subscriber from `LoggingConfig`. `RUST_LOG`
//! takes precedence over the configured level.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

/// Install the global subscriber
///
/// Fails if the format is unknown, the log file cannot be opened, or a
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let writer = make_writer(config)?;
    let ansi = config.file.is_none();
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().with_ansi(ansi).with_writer(writer))
            .try_init(),
        other => {
            return Err(ConfigError::Invalid {
                field: "logging.format".to_string(),
                error: format!("unknown format {:?}", other),
            })
        }
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

/// Log file (appended) or stderr
fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter, ConfigError> {
    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Io {
                    path: path.into(),
                    error: e.to_string(),
                })?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
        None => Ok(BoxMakeWriter::new(std::io::stderr)),
    }
}
