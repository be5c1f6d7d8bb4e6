//! Plugin trait and lifecycle state.
//!
//! A plugin is an extension with a lifecycle. Its hooks are registered
//! with the extension system under the plugin id, so dependency checks
//! and hook removal follow the extension rules.
//!
//! # Lifecycle
//!
//! ```text
//! register_plugin ──► Initialized ──start──► Started
//!                          ▲                    │
//!                          │                  stop
//!                          │                    ▼
//!                          └─────(start)─── Stopped
//!
//! shutdown / unregister_plugin ──► CleanedUp (terminal)
//! ```
//!
//! A plugin whose `initialize` fails never enters the table.

use async_trait::async_trait;
use flux_hook::HookRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{PluginError, RuntimeOptions};

/// Behavior attached to a runtime.
///
/// Every lifecycle method has a no-op default; implement the ones
/// the plugin needs. Methods take `&self`, so plugins keep mutable state
/// behind their own locks.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use flux_hook::{ExtensionPoint, FnHook, HookRef};
/// use flux_runtime::{Plugin, PluginError, RuntimeOptions};
///
/// struct Audit;
///
/// #[async_trait]
/// impl Plugin for Audit {
///     fn id(&self) -> &str {
///         "audit"
///     }
///
///     fn hooks(&self) -> Vec<HookRef> {
///         vec![FnHook::arc("audit-create", ExtensionPoint::ProcessAfterCreate, |params, _ctx| async move {
///             Ok::<_, flux_hook::HookError>(params)
///         })]
///     }
///
///     async fn initialize(&self, options: &RuntimeOptions) -> Result<(), PluginError> {
///         if options.namespace.is_empty() {
///             return Err(PluginError::failed("namespace required"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique id; doubles as the extension id.
    fn id(&self) -> &str;

    /// Display name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    fn description(&self) -> &str {
        ""
    }

    /// Extension ids that must be registered first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Hooks registered under this plugin's extension.
    fn hooks(&self) -> Vec<HookRef> {
        Vec::new()
    }

    /// Called once during registration.
    async fn initialize(&self, _options: &RuntimeOptions) -> Result<(), PluginError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Releases resources. The plugin is not used afterwards.
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Shared handle to a plugin.
pub type PluginRef = Arc<dyn Plugin>;

/// Where a plugin is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
    CleanedUp,
}

impl PluginState {
    /// Returns `true` if `start` may be called.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    /// Short lowercase label for logs and errors.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::CleanedUp => "cleanedUp",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    #[async_trait]
    impl Plugin for Bare {
        fn id(&self) -> &str {
            "bare"
        }
    }

    #[tokio::test]
    async fn defaults_are_noops() {
        let plugin = Bare;
        assert_eq!(plugin.name(), "bare");
        assert!(plugin.dependencies().is_empty());
        assert!(plugin.hooks().is_empty());
        assert!(plugin.initialize(&RuntimeOptions::default()).await.is_ok());
        assert!(plugin.start().await.is_ok());
        assert!(plugin.stop().await.is_ok());
        assert!(plugin.cleanup().await.is_ok());
    }

    #[test]
    fn start_allowed_from_initialized_or_stopped() {
        assert!(PluginState::Initialized.can_start());
        assert!(PluginState::Stopped.can_start());
        assert!(!PluginState::Started.can_start());
        assert!(!PluginState::CleanedUp.can_start());
        assert_eq!(
            serde_json::to_value(PluginState::CleanedUp).expect("serialize"),
            serde_json::json!("cleanedUp")
        );
    }
}
