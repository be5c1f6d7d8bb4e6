//! Error types for the extension system.
//!
//! # Error Codes
//!
//! | Variant | Code | Kind |
//! |---------|------|------|
//! | [`HookError::InvalidPointName`] | `HOOK_INVALID_POINT_NAME` | ValidationError |
//! | [`HookError::UndeclaredPoint`] | `HOOK_UNDECLARED_POINT` | ValidationError |
//! | [`HookError::DuplicateExtension`] | `HOOK_DUPLICATE_EXTENSION` | ValidationError |
//! | [`HookError::MissingDependency`] | `HOOK_MISSING_DEPENDENCY` | ValidationError |
//! | [`HookError::HasDependents`] | `HOOK_HAS_DEPENDENTS` | ValidationError |
//! | [`HookError::ExtensionNotFound`] | `HOOK_EXTENSION_NOT_FOUND` | NotFound |
//! | [`HookError::Rejected`] | `HOOK_REJECTED` | HookFailure |
//! | [`HookError::ExecutionFailed`] | `HOOK_EXECUTION_FAILED` | HookFailure |
//! | [`HookError::DepthExceeded`] | `HOOK_DEPTH_EXCEEDED` | HookFailure |

use flux_types::{ErrorCode, ErrorKind};
use thiserror::Error;

/// Errors that can occur in the extension system.
///
/// Hooks return this type directly; the failure a hook returns is
/// the failure the caller of `execute_extension_point` receives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// Extension point name is not `category:name`.
    #[error("invalid extension point name: {0}")]
    InvalidPointName(String),

    /// A hook targets a point that was never declared.
    #[error("extension point not declared: {0}")]
    UndeclaredPoint(String),

    /// An extension with this id is already registered.
    #[error("extension already registered: {0}")]
    DuplicateExtension(String),

    /// A declared dependency is not registered.
    #[error("extension '{extension}' depends on unregistered '{dependency}'")]
    MissingDependency {
        /// Extension being registered.
        extension: String,
        /// The absent dependency.
        dependency: String,
    },

    /// Other registered extensions still depend on this one.
    #[error("extension '{extension}' is required by {dependents:?}")]
    HasDependents {
        /// Extension being unregistered.
        extension: String,
        /// Registered extensions that list it as a dependency.
        dependents: Vec<String>,
    },

    /// No extension with this id.
    #[error("extension not found: {0}")]
    ExtensionNotFound(String),

    /// A hook deliberately vetoed the operation.
    #[error("hook '{hook_id}' rejected: {reason}")]
    Rejected {
        /// ID of the rejecting hook.
        hook_id: String,
        /// Why the operation was rejected.
        reason: String,
    },

    /// A hook failed while running.
    #[error("hook execution failed [{hook_id}]: {message}")]
    ExecutionFailed {
        /// ID of the hook that failed.
        hook_id: String,
        /// Error message.
        message: String,
    },

    /// Nested extension-point execution went too deep.
    #[error("depth limit exceeded (depth={depth}, max={max_depth})")]
    DepthExceeded {
        /// Current depth.
        depth: u8,
        /// Maximum allowed depth.
        max_depth: u8,
    },
}

impl HookError {
    /// Creates a [`HookError::Rejected`].
    pub fn rejected(hook_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            hook_id: hook_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`HookError::ExecutionFailed`].
    pub fn failed(hook_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            hook_id: hook_id.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for HookError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPointName(_) => "HOOK_INVALID_POINT_NAME",
            Self::UndeclaredPoint(_) => "HOOK_UNDECLARED_POINT",
            Self::DuplicateExtension(_) => "HOOK_DUPLICATE_EXTENSION",
            Self::MissingDependency { .. } => "HOOK_MISSING_DEPENDENCY",
            Self::HasDependents { .. } => "HOOK_HAS_DEPENDENTS",
            Self::ExtensionNotFound(_) => "HOOK_EXTENSION_NOT_FOUND",
            Self::Rejected { .. } => "HOOK_REJECTED",
            Self::ExecutionFailed { .. } => "HOOK_EXECUTION_FAILED",
            Self::DepthExceeded { .. } => "HOOK_DEPTH_EXCEEDED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExecutionFailed { .. })
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPointName(_)
            | Self::UndeclaredPoint(_)
            | Self::DuplicateExtension(_)
            | Self::MissingDependency { .. }
            | Self::HasDependents { .. } => ErrorKind::ValidationError,
            Self::ExtensionNotFound(_) => ErrorKind::NotFound,
            Self::Rejected { .. } | Self::ExecutionFailed { .. } | Self::DepthExceeded { .. } => {
                ErrorKind::HookFailure
            }
        }
    }
}
