//! Structured logging setup
//!
//! Installs a global `tracing-subscriber` fmt subscriber writing to stderr.
//! `RUST_LOG` overrides the configured level. Only binaries should call this.

use crate::config::LoggingConfig;
use crate::error::ConfigError;
use tracing_subscriber::EnvFilter;

/// Build the filter for a configuration, preferring `RUST_LOG`
///
/// # Errors
/// Returns `ConfigError::Logging` if the configured level is not a valid directive
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ConfigError::Logging(format!("invalid level '{}': {e}", config.level)))
}

/// Install the global subscriber
///
/// # Errors
/// Returns `ConfigError::Logging` if the level is invalid or a subscriber is
/// already installed
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}
