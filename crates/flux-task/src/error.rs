//! Task executor errors.
//!
//! Two types live here:
//!
//! - [`TaskFailure`]: what a handler returns when one attempt fails.
//!   Its `error_type` drives the retry filter.
//! - [`TaskError`]: what the executor returns to callers.
//!
//! # Error Codes
//!
//! | Variant | Code | Kind | Recoverable |
//! |---------|------|------|-------------|
//! | [`TaskError::DuplicateTask`] | `TASK_DUPLICATE` | ValidationError | No |
//! | [`TaskError::InvalidDefinition`] | `TASK_INVALID_DEFINITION` | ValidationError | No |
//! | [`TaskError::NotFound`] | `TASK_NOT_FOUND` | NotFound | No |
//! | [`TaskError::ExecutionNotFound`] | `TASK_EXECUTION_NOT_FOUND` | NotFound | No |
//! | [`TaskError::InvalidParams`] | `TASK_INVALID_PARAMS` | ValidationError | No |
//! | [`TaskError::Failed`] | `TASK_FAILED` | ExecutionFailure | No |
//! | [`TaskError::Timeout`] | `TASK_TIMEOUT` | TaskTimeout | Yes |
//! | [`TaskError::Cancelled`] | `TASK_CANCELLED` | TaskCancelled | No |
//! | [`TaskError::DependencyFailed`] | `TASK_DEPENDENCY_FAILED` | delegates | delegates |
//! | [`TaskError::Hook`] | `TASK_HOOK_FAILED` | HookFailure | delegates |

use flux_hook::HookError;
use flux_types::{ErrorCode, ErrorKind, ExecutionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error type carried by a handler failure caused by cancellation.
pub const CANCELLED_ERROR_TYPE: &str = "TaskCancelled";
/// Error type recorded for an attempt that hit its timeout.
pub const TIMEOUT_ERROR_TYPE: &str = "TaskTimeout";

/// One failed attempt, as reported by a task handler.
///
/// # Example
///
/// ```
/// use flux_task::TaskFailure;
///
/// let failure = TaskFailure::new("NetworkError", "connection reset");
/// assert_eq!(failure.to_string(), "NetworkError: connection reset");
/// assert!(!failure.is_cancellation());
/// assert!(TaskFailure::cancelled().is_cancellation());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{error_type}: {message}")]
pub struct TaskFailure {
    /// Failure category matched against `retryable_error_types`.
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
}

impl TaskFailure {
    /// Creates a failure.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// The failure a handler returns after observing cancellation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(CANCELLED_ERROR_TYPE, "task was cancelled")
    }

    /// Returns `true` if this failure reports cancellation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.error_type == CANCELLED_ERROR_TYPE
    }
}

/// Task executor error.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// A task with this id is already registered.
    #[error("task already registered: {0}")]
    DuplicateTask(String),

    /// A task definition failed validation.
    #[error("invalid task definition '{id}': {reason}")]
    InvalidDefinition {
        /// Task id.
        id: String,
        /// What is wrong.
        reason: String,
    },

    /// No task with this id.
    #[error("task not found: {0}")]
    NotFound(String),

    /// No execution with this id.
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// A hook returned params of the wrong shape.
    #[error("invalid hook params: {0}")]
    InvalidParams(String),

    /// The task failed permanently.
    #[error("task '{task_id}' failed after {attempts} attempt(s): {failure}")]
    Failed {
        /// Task id.
        task_id: String,
        /// Attempts made.
        attempts: u32,
        /// The last attempt's failure.
        failure: TaskFailure,
    },

    /// An attempt exceeded the task's timeout.
    #[error("task '{task_id}' timed out after {timeout:?}")]
    Timeout {
        /// Task id.
        task_id: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The task was cancelled.
    #[error("task '{task_id}' was cancelled")]
    Cancelled {
        /// Task id.
        task_id: String,
    },

    /// A dependency did not complete.
    #[error("dependency '{dependency}' of task '{task_id}' failed: {source}")]
    DependencyFailed {
        /// The dependent task.
        task_id: String,
        /// The dependency that failed.
        dependency: String,
        /// Why it failed.
        source: Box<TaskError>,
    },

    /// A `task:*` hook failed; carries the hook's error.
    #[error(transparent)]
    Hook(#[from] HookError),
}

impl TaskError {
    /// Creates an invalid-definition error.
    pub fn invalid_definition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for TaskError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateTask(_) => "TASK_DUPLICATE",
            Self::InvalidDefinition { .. } => "TASK_INVALID_DEFINITION",
            Self::NotFound(_) => "TASK_NOT_FOUND",
            Self::ExecutionNotFound(_) => "TASK_EXECUTION_NOT_FOUND",
            Self::InvalidParams(_) => "TASK_INVALID_PARAMS",
            Self::Failed { .. } => "TASK_FAILED",
            Self::Timeout { .. } => "TASK_TIMEOUT",
            Self::Cancelled { .. } => "TASK_CANCELLED",
            Self::DependencyFailed { .. } => "TASK_DEPENDENCY_FAILED",
            Self::Hook(_) => "TASK_HOOK_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::DependencyFailed { source, .. } => source.is_recoverable(),
            Self::Hook(e) => e.is_recoverable(),
            _ => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateTask(_) | Self::InvalidDefinition { .. } | Self::InvalidParams(_) => {
                ErrorKind::ValidationError
            }
            Self::NotFound(_) | Self::ExecutionNotFound(_) => ErrorKind::NotFound,
            Self::Failed { .. } => ErrorKind::ExecutionFailure,
            Self::Timeout { .. } => ErrorKind::TaskTimeout,
            Self::Cancelled { .. } => ErrorKind::TaskCancelled,
            Self::DependencyFailed { source, .. } => source.kind(),
            Self::Hook(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::assert_error_codes;

    fn all_variants() -> Vec<TaskError> {
        vec![
            TaskError::DuplicateTask("t".into()),
            TaskError::invalid_definition("t", "maxAttempts must be at least 1"),
            TaskError::NotFound("t".into()),
            TaskError::ExecutionNotFound(ExecutionId::new()),
            TaskError::InvalidParams("not an object".into()),
            TaskError::Failed {
                task_id: "t".into(),
                attempts: 3,
                failure: TaskFailure::new("NetworkError", "reset"),
            },
            TaskError::Timeout {
                task_id: "t".into(),
                timeout: Duration::from_millis(50),
            },
            TaskError::Cancelled {
                task_id: "t".into(),
            },
            TaskError::DependencyFailed {
                task_id: "t".into(),
                dependency: "d".into(),
                source: Box::new(TaskError::NotFound("d".into())),
            },
            TaskError::Hook(HookError::rejected("h", "no")),
        ]
    }

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(&all_variants(), "TASK_");
    }

    #[test]
    fn dependency_failure_delegates_kind() {
        let err = TaskError::DependencyFailed {
            task_id: "report".into(),
            dependency: "fetch".into(),
            source: Box::new(TaskError::Timeout {
                task_id: "fetch".into(),
                timeout: Duration::from_secs(1),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::TaskTimeout);
        assert!(err.is_recoverable());
    }

    #[test]
    fn failure_serializes_camel_case() {
        let value = serde_json::to_value(TaskFailure::new("IoError", "disk")).expect("serialize");
        assert_eq!(value, serde_json::json!({"errorType": "IoError", "message": "disk"}));
    }
}
