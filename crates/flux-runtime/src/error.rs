//! Runtime and plugin errors.
//!
//! [`RuntimeError`] unifies every crate error behind the runtime API;
//! its code, kind, and recoverability come from the wrapped error.
//!
//! # Plugin Error Codes
//!
//! | Variant | Code | Kind |
//! |---------|------|------|
//! | [`PluginError::Duplicate`] | `PLUGIN_DUPLICATE` | ValidationError |
//! | [`PluginError::NotFound`] | `PLUGIN_NOT_FOUND` | NotFound |
//! | [`PluginError::Registration`] | `PLUGIN_REGISTRATION_FAILED` | delegates |
//! | [`PluginError::InvalidState`] | `PLUGIN_INVALID_STATE` | ValidationError |
//! | [`PluginError::Lifecycle`] | `PLUGIN_LIFECYCLE_FAILED` | ExecutionFailure |
//! | [`PluginError::Failed`] | `PLUGIN_FAILED` | ExecutionFailure |

use crate::config::ConfigError;
use crate::PluginState;
use flux_event::EventError;
use flux_hook::HookError;
use flux_process::ProcessError;
use flux_task::TaskError;
use flux_types::{ErrorCode, ErrorKind};
use thiserror::Error;

/// Plugin registry and lifecycle error.
///
/// Plugin implementations report their own failures with
/// [`PluginError::failed`]; the runtime wraps them in
/// [`PluginError::Lifecycle`] with the plugin id and phase.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// A plugin with this id is already registered.
    #[error("plugin already registered: {0}")]
    Duplicate(String),

    /// No plugin with this id.
    #[error("plugin not found: {0}")]
    NotFound(String),

    /// The plugin's extension could not be registered or removed.
    #[error("plugin '{plugin}' extension rejected: {source}")]
    Registration {
        plugin: String,
        #[source]
        source: HookError,
    },

    /// The operation is not allowed in the plugin's current state.
    #[error("plugin '{plugin}' cannot {operation} while {state}")]
    InvalidState {
        plugin: String,
        state: PluginState,
        operation: &'static str,
    },

    /// A lifecycle method failed.
    #[error("plugin '{plugin}' failed to {phase}: {message}")]
    Lifecycle {
        plugin: String,
        phase: &'static str,
        message: String,
    },

    /// Failure reported by a plugin implementation.
    #[error("{0}")]
    Failed(String),
}

impl PluginError {
    /// Creates a failure for a plugin to return from a lifecycle method.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn lifecycle(plugin: &str, phase: &'static str, source: &PluginError) -> Self {
        Self::Lifecycle {
            plugin: plugin.to_string(),
            phase,
            message: source.to_string(),
        }
    }
}

impl ErrorCode for PluginError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "PLUGIN_DUPLICATE",
            Self::NotFound(_) => "PLUGIN_NOT_FOUND",
            Self::Registration { .. } => "PLUGIN_REGISTRATION_FAILED",
            Self::InvalidState { .. } => "PLUGIN_INVALID_STATE",
            Self::Lifecycle { .. } => "PLUGIN_LIFECYCLE_FAILED",
            Self::Failed(_) => "PLUGIN_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Registration { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Duplicate(_) | Self::InvalidState { .. } => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Registration { source, .. } => source.kind(),
            Self::Lifecycle { .. } | Self::Failed(_) => ErrorKind::ExecutionFailure,
        }
    }
}

/// Unified runtime error.
///
/// # Example
///
/// ```
/// use flux_process::ProcessError;
/// use flux_runtime::RuntimeError;
/// use flux_types::{ErrorCode, ErrorKind, ProcessId};
///
/// let err: RuntimeError = ProcessError::NotFound(ProcessId::new()).into();
/// assert_eq!(err.code(), "PROCESS_NOT_FOUND");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `initialize` was called twice.
    #[error("runtime already initialized")]
    AlreadyInitialized,
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Hook(e) => e.code(),
            Self::Event(e) => e.code(),
            Self::Process(e) => e.code(),
            Self::Task(e) => e.code(),
            Self::Plugin(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::AlreadyInitialized => "RUNTIME_ALREADY_INITIALIZED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Hook(e) => e.is_recoverable(),
            Self::Event(e) => e.is_recoverable(),
            Self::Process(e) => e.is_recoverable(),
            Self::Task(e) => e.is_recoverable(),
            Self::Plugin(e) => e.is_recoverable(),
            Self::Config(e) => e.is_recoverable(),
            Self::AlreadyInitialized => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Hook(e) => e.kind(),
            Self::Event(e) => e.kind(),
            Self::Process(e) => e.kind(),
            Self::Task(e) => e.kind(),
            Self::Plugin(e) => e.kind(),
            Self::Config(e) => e.kind(),
            Self::AlreadyInitialized => ErrorKind::ValidationError,
        }
    }
}
