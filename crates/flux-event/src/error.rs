//! Event layer errors.
//!
//! All event errors use the `EVENT_` prefix for their codes:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EventError::Hook`] | `EVENT_HOOK_FAILED` | delegates |
//! | [`EventError::PersistenceDisabled`] | `EVENT_PERSISTENCE_DISABLED` | No |
//! | [`EventError::Storage`] | `EVENT_STORAGE_FAILED` | Yes |
//! | [`EventError::DuplicateEvent`] | `EVENT_DUPLICATE` | No |
//! | [`EventError::InvalidEvent`] | `EVENT_INVALID` | No |
//! | [`EventError::InvalidWindow`] | `EVENT_INVALID_WINDOW` | No |

use chrono::{DateTime, Utc};
use flux_hook::HookError;
use flux_types::{ErrorCode, ErrorKind, EventId};
use thiserror::Error;

/// Errors that can occur on the event bus or in event storage.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// A hook on an `event:*` point failed; carries the hook's error.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The operation needs storage but persistence is disabled.
    #[error("event persistence is not enabled")]
    PersistenceDisabled,

    /// The storage backend failed.
    #[error("event storage failed: {0}")]
    Storage(String),

    /// An event with this id is already stored.
    #[error("event already stored: {0}")]
    DuplicateEvent(EventId),

    /// A hook rewrote an event (or replay window) into an invalid shape.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Replay window has `from` after `to`.
    #[error("invalid replay window: {from} is after {to}")]
    InvalidWindow {
        /// Window start.
        from: DateTime<Utc>,
        /// Window end.
        to: DateTime<Utc>,
    },
}

impl EventError {
    /// Creates a storage failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::Hook(_) => "EVENT_HOOK_FAILED",
            Self::PersistenceDisabled => "EVENT_PERSISTENCE_DISABLED",
            Self::Storage(_) => "EVENT_STORAGE_FAILED",
            Self::DuplicateEvent(_) => "EVENT_DUPLICATE",
            Self::InvalidEvent(_) => "EVENT_INVALID",
            Self::InvalidWindow { .. } => "EVENT_INVALID_WINDOW",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Hook(e) => e.is_recoverable(),
            Self::Storage(_) => true,
            _ => false,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Hook(e) => e.kind(),
            Self::PersistenceDisabled | Self::Storage(_) => ErrorKind::PersistenceFailure,
            Self::DuplicateEvent(_) | Self::InvalidEvent(_) | Self::InvalidWindow { .. } => {
                ErrorKind::ValidationError
            }
        }
    }
}
