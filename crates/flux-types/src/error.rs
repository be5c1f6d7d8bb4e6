//! Unified error interface for Flux.
//!
//! This module provides the [`ErrorCode`] trait for standardized
//! error handling across all Flux crates, the closed [`ErrorKind`]
//! taxonomy, and the host-facing [`Outcome`] shape.
//!
//! # Design
//!
//! Every Flux error type implements [`ErrorCode`] to provide:
//!
//! - **Machine-readable codes**: For programmatic error handling
//! - **Recoverability info**: For caller-level retry decisions
//! - **Kind**: The coarse category a host branches on
//!
//! Internally every fallible operation returns `Result<T, E>` with a
//! crate-specific `E`. At the host boundary, [`Outcome`] converts any
//! such result into the tagged `{success, value | error}` shape.
//!
//! # Example
//!
//! ```
//! use flux_types::{ErrorCode, ErrorKind};
//!
//! #[derive(Debug)]
//! enum MyError {
//!     NotFound(String),
//!     Timeout,
//! }
//!
//! impl ErrorCode for MyError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NotFound(_) => "MY_NOT_FOUND",
//!             Self::Timeout => "MY_TIMEOUT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Timeout)
//!     }
//!
//!     fn kind(&self) -> ErrorKind {
//!         match self {
//!             Self::NotFound(_) => ErrorKind::NotFound,
//!             Self::Timeout => ErrorKind::TaskTimeout,
//!         }
//!     }
//! }
//!
//! let err = MyError::Timeout;
//! assert_eq!(err.code(), "MY_TIMEOUT");
//! assert!(err.is_recoverable());
//! assert_eq!(err.kind(), ErrorKind::TaskTimeout);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse error taxonomy shared by every Flux crate.
///
/// Hosts branch on the kind; the precise cause lives in the
/// crate-specific error and its [`ErrorCode::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed definition or registration (duplicate id, missing dependency, ...).
    ValidationError,
    /// No matching, guard-passing transition for `(state, eventType)`.
    InvalidTransition,
    /// Unknown process, task, checkpoint, extension, or subscription id.
    NotFound,
    /// A task handler or state action failed.
    ExecutionFailure,
    /// A task observed cancellation.
    TaskCancelled,
    /// A task exceeded its configured timeout.
    TaskTimeout,
    /// An extension-point hook returned a failure.
    HookFailure,
    /// The event store rejected an operation or persistence is unavailable.
    PersistenceFailure,
    /// Configuration could not be loaded or is invalid.
    ConfigError,
}

impl ErrorKind {
    /// Returns the canonical name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::InvalidTransition => "InvalidTransition",
            Self::NotFound => "NotFound",
            Self::ExecutionFailure => "ExecutionFailure",
            Self::TaskCancelled => "TaskCancelled",
            Self::TaskTimeout => "TaskTimeout",
            Self::HookFailure => "HookFailure",
            Self::PersistenceFailure => "PersistenceFailure",
            Self::ConfigError => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error code interface for Flux errors.
///
/// # Code Format
///
/// Error codes should be:
///
/// - **UPPER_SNAKE_CASE**: e.g., `"TASK_TIMEOUT"`
/// - **Namespace-prefixed**: e.g., `"HOOK_"`, `"EVENT_"`, `"PROCESS_"`
/// - **Stable**: Codes should not change once defined (API contract)
///
/// # Recoverability
///
/// An error is recoverable if re-submitting the caller-level
/// operation may succeed (transient failures, timeouts). Validation
/// failures and missing ids are never recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;

    /// Returns the coarse [`ErrorKind`] of this error.
    fn kind(&self) -> ErrorKind;
}

/// Serializable error description carried by a failed [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorInfo {
    /// Human-readable message.
    pub message: String,
    /// Coarse error kind, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Machine-readable code, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorInfo {
    /// Creates an error description with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            code: None,
        }
    }

    /// Builds an error description from any Flux error.
    #[must_use]
    pub fn from_error<E: ErrorCode + fmt::Display + ?Sized>(err: &E) -> Self {
        Self {
            message: err.to_string(),
            kind: Some(err.kind()),
            code: Some(err.code().to_string()),
        }
    }
}

/// Tagged success/failure shape returned to hosts.
///
/// Serializes as `{"success": true, "value": ...}` or
/// `{"success": false, "error": {"message": ..., "kind": ...}}`.
///
/// # Example
///
/// ```
/// use flux_types::{ErrorInfo, Outcome};
///
/// let ok: Outcome<u32> = Outcome::from_result(Ok::<_, ErrorInfo>(7));
/// assert!(ok.success);
/// assert_eq!(ok.into_result().ok(), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    /// The error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl<T> Outcome<T> {
    /// Creates a successful outcome.
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    /// Creates a failed outcome.
    pub fn err(error: ErrorInfo) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error),
        }
    }

    /// Converts a crate-level result into the host shape.
    pub fn from_result<E: ErrorCode + fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(ErrorInfo::from_error(&e)),
        }
    }

    /// Converts back into a `Result`.
    ///
    /// A malformed outcome (success without value, failure without
    /// error) yields an error describing the inconsistency.
    pub fn into_result(self) -> Result<T, ErrorInfo> {
        match (self.success, self.value, self.error) {
            (true, Some(value), _) => Ok(value),
            (false, _, Some(error)) => Err(error),
            (true, None, _) => Err(ErrorInfo::message("successful outcome carries no value")),
            (false, _, None) => Err(ErrorInfo::message("failed outcome carries no error")),
        }
    }
}

impl ErrorCode for ErrorInfo {
    fn code(&self) -> &'static str {
        "OUTCOME_ERROR"
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn kind(&self) -> ErrorKind {
        self.kind.unwrap_or(ErrorKind::ExecutionFailure)
    }
}

/// Validates that an error code follows Flux conventions.
///
/// # Panics
///
/// Panics with descriptive message if the code is empty, lacks the
/// expected prefix, or is not UPPER_SNAKE_CASE.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates multiple error codes at once.
///
/// Use this to verify all variants of an error enum.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
