//! Configuration management with layered loading.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. Environment Variables (FLUX_*)      │  Deployment override
//! ├─────────────────────────────────────────┤
//! │  2. Config File (flux.toml)             │  Host settings
//! ├─────────────────────────────────────────┤
//! │  3. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `FLUX_VERSION` | `runtime.version` | String |
//! | `FLUX_NAMESPACE` | `runtime.namespace` | String |
//! | `FLUX_PERSIST_EVENTS` | `events.persistence` | bool |
//! | `FLUX_EVENT_RETENTION_SECS` | `events.retention_secs` | u64 |
//! | `FLUX_LOG` | `logging.filter` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! [runtime]
//! version = "1.4.0"
//! namespace = "billing"
//!
//! [runtime.metadata]
//! region = "eu-west"
//!
//! [events]
//! persistence = true
//! retention_secs = 86400
//!
//! [hooks]
//! max_depth = 4
//!
//! [logging]
//! filter = "info,flux_task=debug"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{EventsConfig, FluxConfig, HooksConfig, LoggingConfig, RuntimeSection};

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "flux.toml";
