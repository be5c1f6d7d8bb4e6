//! Flux runtime: composition root, plugins, and configuration.
//!
//! # Overview
//!
//! [`Runtime`] owns one [`ExtensionSystem`](flux_hook::ExtensionSystem),
//! one [`EventBus`](flux_event::EventBus), one
//! [`ProcessEngine`](flux_process::ProcessEngine), and one
//! [`TaskExecutor`](flux_task::TaskExecutor), all sharing the same hook
//! chains. Hosts talk to the runtime; the engines stay reachable through
//! accessors for anything the unified API does not cover.
//!
//! [`Plugin`]s bundle hooks with a lifecycle:
//!
//! ```text
//! register_plugin ─► initialize ─► start (registration order)
//!                                    │
//!             shutdown ◄─ stop (reverse order)
//! ```
//!
//! # Configuration
//!
//! [`config::ConfigLoader`] layers defaults, `flux.toml`, and `FLUX_*`
//! environment variables into a [`config::FluxConfig`];
//! [`Runtime::from_config`] builds a runtime from it and
//! [`logging::init_tracing`] installs the log filter.
//!
//! ```no_run
//! use flux_runtime::config::ConfigLoader;
//! use flux_runtime::{logging, Runtime, RuntimeError};
//!
//! # async fn run() -> Result<(), RuntimeError> {
//! let config = ConfigLoader::new().load()?;
//! logging::init_tracing(&config.logging)?;
//!
//! let runtime = Runtime::from_config(&config);
//! runtime.initialize(config.runtime_options()).await?;
//! runtime.start().await?;
//! // ...
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every runtime operation returns [`RuntimeError`], which wraps the
//! crate-level errors and keeps their codes and kinds.

pub mod config;
mod error;
pub mod logging;
mod plugin;
mod runtime;

pub use error::{PluginError, RuntimeError};
pub use plugin::{Plugin, PluginRef, PluginState};
pub use runtime::{Runtime, RuntimeOptions};
