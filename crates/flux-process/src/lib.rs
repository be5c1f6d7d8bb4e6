//! Versioned state-machine processes for the Flux runtime.
//!
//! # Overview
//!
//! A [`ProcessDefinition`] declares states, transitions (optionally
//! guarded), and entry/exit actions. The [`ProcessEngine`] creates
//! [`ProcessInstance`]s from definitions, applies events to them, and
//! snapshots them into [`ProcessCheckpoint`]s.
//!
//! # Versioning
//!
//! Definitions sharing a `name` coexist when their versions differ.
//! New instances take the highest version unless
//! [`CreateOptions::version`] pins one; an instance stays pinned to
//! its definition for life, so registering a newer version never
//! changes how existing instances transition.
//!
//! # Extension Points
//!
//! | Point | Params | Effect |
//! |-------|--------|--------|
//! | `process:beforeCreate` | `{type, version, data}` | may rewrite `data` or reject |
//! | `process:afterCreate` | the instance | may reject (nothing stored) |
//! | `process:beforeTransition` | `{processId, from, to, event, payload}` | may rewrite `payload` or reject |
//! | `process:afterTransition` | `{processId, from, to, event, instance}` | may reject (nothing committed) |
//!
//! # Domain Events
//!
//! Successful operations publish [`events::PROCESS_CREATED`],
//! [`events::PROCESS_TRANSITIONED`], and [`events::PROCESS_RESTORED`]
//! with `metadata.correlationId` set to the process id.

mod definition;
mod engine;
mod error;
mod instance;
mod store;

pub use definition::{
    compare_versions, ActionContext, ActionRef, FnAction, Guard, ProcessDefinition, StateAction,
    Transition,
};
pub use engine::ProcessEngine;
pub use error::ProcessError;
pub use instance::{CreateOptions, ProcessCheckpoint, ProcessInstance, RecoveryInfo};
pub use store::{InMemoryProcessStore, ProcessStore};

/// Domain event types published by the engine.
pub mod events {
    /// A process was created.
    pub const PROCESS_CREATED: &str = "process:created";
    /// A process changed state.
    pub const PROCESS_TRANSITIONED: &str = "process:transitioned";
    /// A process was restored from a checkpoint.
    pub const PROCESS_RESTORED: &str = "process:restored";
}
