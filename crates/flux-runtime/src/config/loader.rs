//! Configuration loader with layered merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Config file (explicit path, or `flux.toml` in the working directory)
//! 3. Environment variables (`FLUX_*`)
//!
//! Each layer overrides the previous.

use super::{ConfigError, FluxConfig, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use flux_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_config_file("/etc/flux/flux.toml")
///     .load()?;
/// # Ok::<(), flux_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Config file path (defaults to `./flux.toml`).
    config_path: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip config file loading.
    skip_file: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the config file path.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips config file loading.
    #[must_use]
    pub fn skip_config_file(mut self) -> Self {
        self.skip_file = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file exists but cannot be
    /// read or parsed, or an environment variable is malformed.
    /// A missing config file is silently ignored.
    pub fn load(&self) -> Result<FluxConfig, ConfigError> {
        let mut config = FluxConfig::default();

        if !self.skip_file {
            let path = self
                .config_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

            if let Some(file_config) = load_file(&path)? {
                debug!(path = %path.display(), "Loaded config file");
                config.merge(&file_config);
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<FluxConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config = FluxConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    Ok(Some(config))
}

/// Applies environment variable overrides.
fn apply_env_vars(config: &mut FluxConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.events.persistence, "FLUX_PERSIST_EVENTS");

    if let Ok(val) = std::env::var("FLUX_EVENT_RETENTION_SECS") {
        let secs = val
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::invalid_env_var("FLUX_EVENT_RETENTION_SECS", e.to_string()))?;
        config.events.retention_secs = Some(secs);
    }

    if let Ok(val) = std::env::var("FLUX_VERSION") {
        config.runtime.version = val;
    }
    if let Ok(val) = std::env::var("FLUX_NAMESPACE") {
        config.runtime.namespace = val;
    }
    if let Ok(val) = std::env::var("FLUX_LOG") {
        if val.trim().is_empty() {
            return Err(ConfigError::invalid_env_var("FLUX_LOG", "empty filter"));
        }
        config.logging.filter = val;
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off"
/// (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("flux.toml");
        std::fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_config_file()
            .skip_env_vars()
            .load()
            .expect("load");
        assert_eq!(config, FluxConfig::default());
    }

    #[test]
    fn load_file_overrides_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_config(
            temp.path(),
            r#"
[runtime]
namespace = "orders"

[runtime.metadata]
region = "eu-west"

[events]
persistence = true
retention_secs = 3600

[hooks]
max_depth = 8
"#,
        );

        let config = ConfigLoader::new()
            .with_config_file(&path)
            .skip_env_vars()
            .load()
            .expect("load");

        assert_eq!(config.runtime.namespace, "orders");
        assert_eq!(config.runtime.metadata["region"], "eu-west");
        assert!(config.events.persistence);
        assert_eq!(config.events.retention_secs, Some(3600));
        assert_eq!(config.hooks.max_depth, 8);
        assert_eq!(config.logging, crate::config::LoggingConfig::default());
    }

    #[test]
    fn missing_file_ok() {
        let config = ConfigLoader::new()
            .with_config_file("/nonexistent/path/flux.toml")
            .skip_env_vars()
            .load()
            .expect("load");
        assert_eq!(config, FluxConfig::default());
    }

    #[test]
    fn malformed_file_fails() {
        let temp = TempDir::new().expect("tempdir");
        let path = write_config(temp.path(), "[events]\npersistence = \"sometimes\"\n");

        let err = ConfigLoader::new()
            .with_config_file(&path)
            .skip_env_vars()
            .load()
            .expect_err("bad type");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));

        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("invalid"), None);
    }
}
