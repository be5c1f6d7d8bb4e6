//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use crate::RuntimeOptions;
use flux_hook::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Main configuration structure.
///
/// # Example
///
/// ```
/// use flux_runtime::config::FluxConfig;
///
/// let config = FluxConfig::from_toml(
///     r#"
/// [runtime]
/// namespace = "billing"
///
/// [events]
/// persistence = true
/// "#,
/// )
/// .expect("valid toml");
/// assert_eq!(config.runtime.namespace, "billing");
/// assert!(config.events.persistence);
/// assert_eq!(config.hooks.max_depth, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FluxConfig {
    /// Runtime identity.
    pub runtime: RuntimeSection,

    /// Event bus settings.
    pub events: EventsConfig,

    /// Extension system settings.
    pub hooks: HooksConfig,

    /// Log filter for hosts that call
    /// [`init_tracing`](crate::logging::init_tracing).
    pub logging: LoggingConfig,
}

impl FluxConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Options to pass to [`Runtime::initialize`](crate::Runtime::initialize).
    #[must_use]
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            version: self.runtime.version.clone(),
            namespace: self.runtime.namespace.clone(),
            metadata: self.runtime.metadata.clone(),
        }
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        self.runtime.merge(&other.runtime);
        self.events.merge(&other.events);
        self.hooks.merge(&other.hooks);
        self.logging.merge(&other.logging);
    }
}

/// `[runtime]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSection {
    /// Reported in `system:init`.
    pub version: String,

    /// Logical namespace of this runtime.
    pub namespace: String,

    /// Free-form metadata handed to `system:init` and plugins.
    pub metadata: Map<String, Value>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").into(),
            namespace: "default".into(),
            metadata: Map::new(),
        }
    }
}

impl RuntimeSection {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.version != default.version {
            self.version = other.version.clone();
        }
        if other.namespace != default.namespace {
            self.namespace = other.namespace.clone();
        }
        for (key, value) in &other.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// `[events]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Store published events in an in-memory event store.
    pub persistence: bool,

    /// Drop stored events older than this many seconds.
    pub retention_secs: Option<u64>,
}

impl EventsConfig {
    /// Retention as a [`Duration`].
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    fn merge(&mut self, other: &Self) {
        if other.persistence {
            self.persistence = true;
        }
        if other.retention_secs.is_some() {
            self.retention_secs = other.retention_secs;
        }
    }
}

/// `[hooks]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HooksConfig {
    /// Maximum nesting depth of extension point executions.
    pub max_depth: u8,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HooksConfig {
    fn merge(&mut self, other: &Self) {
        if other.max_depth != Self::default().max_depth {
            self.max_depth = other.max_depth;
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info,flux_task=debug"`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        if other.filter != Self::default().filter {
            self.filter = other.filter.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = FluxConfig::from_toml("").expect("parse");
        assert_eq!(config, FluxConfig::default());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = FluxConfig::default();
        config.events.retention_secs = Some(60);
        config.runtime.metadata.insert("region".into(), "eu".into());
        let text = config.to_toml().expect("serialize");
        assert_eq!(FluxConfig::from_toml(&text).expect("parse"), config);
    }

    #[test]
    fn merge_keeps_base_when_other_is_default() {
        let mut base = FluxConfig::default();
        base.runtime.namespace = "orders".into();
        base.hooks.max_depth = 8;

        base.merge(&FluxConfig::default());
        assert_eq!(base.runtime.namespace, "orders");
        assert_eq!(base.hooks.max_depth, 8);
    }

    #[test]
    fn merge_overrides_and_extends_metadata() {
        let mut base = FluxConfig::default();
        base.runtime.metadata.insert("a".into(), 1.into());

        let mut other = FluxConfig::default();
        other.runtime.metadata.insert("b".into(), 2.into());
        other.logging.filter = "debug".into();
        other.events.persistence = true;

        base.merge(&other);
        assert_eq!(base.runtime.metadata.len(), 2);
        assert_eq!(base.logging.filter, "debug");
        assert!(base.events.persistence);
    }

    #[test]
    fn options_mirror_runtime_section() {
        let mut config = FluxConfig::default();
        config.runtime.namespace = "ns".into();
        let options = config.runtime_options();
        assert_eq!(options.namespace, "ns");
        assert_eq!(options.version, config.runtime.version);
    }
}
