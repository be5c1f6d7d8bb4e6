//! Configuration errors.
//!
//! # Error Codes
//!
//! | Variant | Code |
//! |---------|------|
//! | [`ConfigError::ReadFile`] | `CONFIG_READ_FAILED` |
//! | [`ConfigError::ParseToml`] | `CONFIG_PARSE_FAILED` |
//! | [`ConfigError::InvalidEnvVar`] | `CONFIG_INVALID_ENV_VAR` |
//! | [`ConfigError::InvalidLogFilter`] | `CONFIG_INVALID_LOG_FILTER` |
//!
//! All are kind `ConfigError` and not recoverable.

use flux_types::{ErrorCode, ErrorKind};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Invalid environment variable value.
    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    /// `logging.filter` is not a valid `EnvFilter` directive.
    #[error("invalid log filter '{filter}': {message}")]
    InvalidLogFilter { filter: String, message: String },
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse TOML error.
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid env var error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FAILED",
            Self::ParseToml { .. } => "CONFIG_PARSE_FAILED",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
            Self::InvalidLogFilter { .. } => "CONFIG_INVALID_LOG_FILTER",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigError
    }
}
