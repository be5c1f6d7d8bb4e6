//! Extension points and hook chains for the Flux runtime.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  flux-types   : IDs, ErrorCode, ErrorKind                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  flux-hook    : ExtensionSystem, Hook, HookRegistry ◄── HERE │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  flux-event / flux-process / flux-task / flux-runtime       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Extension Points
//!
//! [`ExtensionPoint`] names a lifecycle moment as `category:name`.
//! Thirteen points are builtin (`system:init`, `task:beforeExecution`,
//! `event:beforePublish`, ...); hosts may declare more with
//! [`ExtensionSystem::register_extension_point`].
//!
//! ## Hooks
//!
//! A [`Hook`] is an async handler bound to one point with a priority.
//! Higher priority runs first; equal priorities run in registration
//! order. Each hook receives the params returned by the previous one.
//!
//! ## Extensions
//!
//! An [`Extension`] bundles hooks under an id and may depend on other
//! extensions. Registration and unregistration are all-or-nothing.
//!
//! # Example
//!
//! ```
//! use flux_hook::{Extension, ExtensionPoint, ExtensionSystem, FnHook};
//!
//! let system = ExtensionSystem::new();
//! let audit = FnHook::arc("audit", ExtensionPoint::TaskBeforeExecution, |params, _ctx| async move {
//!     Ok::<_, flux_hook::HookError>(params)
//! });
//! system
//!     .register_extension(Extension::new("audit", "Audit").with_hook(audit))
//!     .expect("registration should succeed");
//! assert_eq!(system.hook_count(), 1);
//! ```

mod context;
mod error;
mod extension;
pub mod hook;
mod point;
mod registry;
mod system;

pub use context::{HookContext, DEFAULT_MAX_DEPTH};
pub use error::HookError;
pub use extension::{Extension, ExtensionInfo};
pub use hook::{FnHook, Hook, HookRef, HookResult};
pub use point::ExtensionPoint;
pub use registry::{HookRegistration, HookRegistry};
pub use system::ExtensionSystem;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    //! Test utilities for the hook system.
    //!
    //! Provides [`MockHook`] for use in tests.
    pub use crate::hook::testing::MockHook;
}
