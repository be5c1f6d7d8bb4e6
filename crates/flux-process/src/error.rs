//! Process engine errors.
//!
//! # Error Codes
//!
//! | Variant | Code | Kind |
//! |---------|------|------|
//! | [`ProcessError::InvalidDefinition`] | `PROCESS_INVALID_DEFINITION` | ValidationError |
//! | [`ProcessError::DuplicateDefinition`] | `PROCESS_DUPLICATE_DEFINITION` | ValidationError |
//! | [`ProcessError::DuplicateVersion`] | `PROCESS_DUPLICATE_VERSION` | ValidationError |
//! | [`ProcessError::InvalidParams`] | `PROCESS_INVALID_PARAMS` | ValidationError |
//! | [`ProcessError::DefinitionNotFound`] | `PROCESS_DEFINITION_NOT_FOUND` | NotFound |
//! | [`ProcessError::NotFound`] | `PROCESS_NOT_FOUND` | NotFound |
//! | [`ProcessError::CheckpointNotFound`] | `PROCESS_CHECKPOINT_NOT_FOUND` | NotFound |
//! | [`ProcessError::InvalidTransition`] | `PROCESS_INVALID_TRANSITION` | InvalidTransition |
//! | [`ProcessError::ActionFailed`] | `PROCESS_ACTION_FAILED` | ExecutionFailure |
//! | [`ProcessError::Store`] | `PROCESS_STORE_FAILED` | PersistenceFailure |
//! | [`ProcessError::Hook`] | `PROCESS_HOOK_FAILED` | HookFailure |
//!
//! # Example
//!
//! ```
//! use flux_process::ProcessError;
//! use flux_types::{ErrorCode, ErrorKind, ProcessId};
//!
//! let err = ProcessError::InvalidTransition {
//!     process_id: ProcessId::new(),
//!     state: "draft".into(),
//!     event: "ship".into(),
//! };
//! assert_eq!(err.code(), "PROCESS_INVALID_TRANSITION");
//! assert_eq!(err.kind(), ErrorKind::InvalidTransition);
//! ```

use flux_hook::HookError;
use flux_types::{CheckpointId, ErrorCode, ErrorKind, ProcessId};
use thiserror::Error;

/// Process engine error.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// A definition failed validation.
    #[error("invalid process definition '{id}': {reason}")]
    InvalidDefinition {
        /// Definition id (may be empty).
        id: String,
        /// What is wrong.
        reason: String,
    },

    /// A definition with this id is already registered.
    #[error("process definition already registered: {0}")]
    DuplicateDefinition(String),

    /// A definition with the same name and version is already registered.
    #[error("process '{name}' already has version {version}")]
    DuplicateVersion {
        /// Definition name.
        name: String,
        /// Version, or `unversioned`.
        version: String,
    },

    /// A hook rewrote params into an unusable shape.
    #[error("invalid hook params: {0}")]
    InvalidParams(String),

    /// No definition matches the requested type (and version).
    #[error("no process definition for '{process_type}'{}", version_suffix(.version))]
    DefinitionNotFound {
        /// Requested process type.
        process_type: String,
        /// Requested version, if pinned.
        version: Option<String>,
    },

    /// No such process instance.
    #[error("process not found: {0}")]
    NotFound(ProcessId),

    /// No such checkpoint for the process.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(CheckpointId),

    /// No transition (with a passing guard) for this state and event.
    #[error("no transition from '{state}' on '{event}' for process {process_id}")]
    InvalidTransition {
        /// The process.
        process_id: ProcessId,
        /// Its current state.
        state: String,
        /// The event that was applied.
        event: String,
    },

    /// An entry or exit action failed.
    #[error("{phase} action for state '{state}' failed: {message}")]
    ActionFailed {
        /// `entry` or `exit`.
        phase: &'static str,
        /// The state the action belongs to.
        state: String,
        /// The action's message.
        message: String,
    },

    /// The process store failed.
    #[error("process store failed: {0}")]
    Store(String),

    /// A `process:*` hook failed; carries the hook's error.
    #[error(transparent)]
    Hook(#[from] HookError),
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_deref()
        .map(|v| format!(" version {v}"))
        .unwrap_or_default()
}

impl ProcessError {
    /// Creates an invalid-definition error.
    pub fn invalid_definition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

impl ErrorCode for ProcessError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidDefinition { .. } => "PROCESS_INVALID_DEFINITION",
            Self::DuplicateDefinition(_) => "PROCESS_DUPLICATE_DEFINITION",
            Self::DuplicateVersion { .. } => "PROCESS_DUPLICATE_VERSION",
            Self::InvalidParams(_) => "PROCESS_INVALID_PARAMS",
            Self::DefinitionNotFound { .. } => "PROCESS_DEFINITION_NOT_FOUND",
            Self::NotFound(_) => "PROCESS_NOT_FOUND",
            Self::CheckpointNotFound(_) => "PROCESS_CHECKPOINT_NOT_FOUND",
            Self::InvalidTransition { .. } => "PROCESS_INVALID_TRANSITION",
            Self::ActionFailed { .. } => "PROCESS_ACTION_FAILED",
            Self::Store(_) => "PROCESS_STORE_FAILED",
            Self::Hook(_) => "PROCESS_HOOK_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Hook(e) => e.is_recoverable(),
            _ => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDefinition { .. }
            | Self::DuplicateDefinition(_)
            | Self::DuplicateVersion { .. }
            | Self::InvalidParams(_) => ErrorKind::ValidationError,
            Self::DefinitionNotFound { .. } | Self::NotFound(_) | Self::CheckpointNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ActionFailed { .. } => ErrorKind::ExecutionFailure,
            Self::Store(_) => ErrorKind::PersistenceFailure,
            Self::Hook(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::assert_error_codes;

    fn all_variants() -> Vec<ProcessError> {
        vec![
            ProcessError::invalid_definition("d", "empty name"),
            ProcessError::DuplicateDefinition("d".into()),
            ProcessError::DuplicateVersion {
                name: "order".into(),
                version: "1.0".into(),
            },
            ProcessError::InvalidParams("data".into()),
            ProcessError::DefinitionNotFound {
                process_type: "order".into(),
                version: None,
            },
            ProcessError::NotFound(ProcessId::new()),
            ProcessError::CheckpointNotFound(CheckpointId::new()),
            ProcessError::InvalidTransition {
                process_id: ProcessId::new(),
                state: "a".into(),
                event: "go".into(),
            },
            ProcessError::ActionFailed {
                phase: "entry",
                state: "b".into(),
                message: "boom".into(),
            },
            ProcessError::store("locked"),
            ProcessError::Hook(HookError::rejected("h", "no")),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "PROCESS_");
    }

    #[test]
    fn checkpoint_not_found_is_not_found_kind() {
        let err = ProcessError::CheckpointNotFound(CheckpointId::new());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn definition_not_found_mentions_version() {
        let err = ProcessError::DefinitionNotFound {
            process_type: "order".into(),
            version: Some("2.0".into()),
        };
        assert_eq!(err.to_string(), "no process definition for 'order' version 2.0");
    }

    #[test]
    fn hook_error_passes_through() {
        let err = ProcessError::from(HookError::rejected("guard", "closed"));
        assert_eq!(err.kind(), ErrorKind::HookFailure);
        assert_eq!(err.to_string(), "hook 'guard' rejected: closed");
    }
}
