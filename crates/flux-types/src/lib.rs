//! Core types for the Flux reactive runtime.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Foundation Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  flux-types   : IDs, ErrorCode, ErrorKind, Outcome  ◄── HERE │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Core Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  flux-hook    : ExtensionSystem, Hook, HookRegistry         │
//! │  flux-event   : EventBus, EventStorage, replay              │
//! │  flux-process : ProcessEngine, definitions, checkpoints     │
//! │  flux-task    : TaskExecutor, retry, cancellation           │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Composition Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  flux-runtime : Runtime, plugins, config, logging           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation in Flux returns a `Result` whose error
//! implements [`ErrorCode`]. Hosts that need the tagged wire shape
//! convert with [`Outcome::from_result`].
//!
//! # Example
//!
//! ```
//! use flux_types::{ExecutionId, ProcessId};
//!
//! let process = ProcessId::new();
//! let execution = ExecutionId::new();
//! assert!(process.to_string().starts_with("proc:"));
//! assert!(execution.to_string().starts_with("exec:"));
//! ```

mod error;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode, ErrorInfo, ErrorKind, Outcome};
pub use id::{CheckpointId, EventId, ExecutionId, ProcessId, SubscriptionId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(ProcessId::new(), ProcessId::new());
        assert_ne!(CheckpointId::new(), CheckpointId::new());
    }

    #[test]
    fn id_display_prefixes() {
        let id = SubscriptionId::new();
        assert_eq!(id.to_string(), format!("sub:{}", id.uuid()));
    }

    #[test]
    fn id_parse_accepts_prefixed_and_bare() {
        let id = ProcessId::new();
        assert_eq!(ProcessId::parse(&id.to_string()).ok(), Some(id));
        assert_eq!(ProcessId::parse(&id.uuid().to_string()).ok(), Some(id));
        assert!(ProcessId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn id_serializes_transparently() {
        let id = EventId::new();
        let json = serde_json::to_value(id).expect("id should serialize");
        assert_eq!(json, serde_json::Value::String(id.uuid().to_string()));
        let back: EventId = serde_json::from_value(json).expect("id should deserialize");
        assert_eq!(back, id);
    }
}
