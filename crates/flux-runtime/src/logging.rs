//! Tracing setup for hosts.
//!
//! The library crates only emit `tracing` events. A host that wants
//! them printed calls [`init_tracing`] once at startup.

use crate::config::{ConfigError, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Builds the `EnvFilter` for `config`.
///
/// # Errors
///
/// [`ConfigError::InvalidLogFilter`] if the directive does not parse.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidLogFilter {
        filter: config.filter.clone(),
        message: e.to_string(),
    })
}

/// Installs a global `fmt` subscriber filtered by `config.filter`.
///
/// Returns `false` if a global subscriber was already installed; the
/// existing one is left in place.
///
/// # Errors
///
/// [`ConfigError::InvalidLogFilter`] if the directive does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = env_filter(config)?;
    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(filter))
        .try_init()
        .is_ok();
    Ok(installed)
}
