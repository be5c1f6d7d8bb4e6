//! Hook registry: per-point ordered hook lists.
//!
//! The registry itself is not synchronized; the
//! [`ExtensionSystem`](crate::ExtensionSystem) wraps it in a lock and
//! snapshots a chain before running it.

use crate::{ExtensionPoint, HookRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A registered hook with metadata.
struct RegisteredHook {
    hook: HookRef,
    /// The extension that owns this hook.
    extension_id: String,
    priority: i32,
    enabled: bool,
}

/// Public view of one registration, in execution order.
#[derive(Clone)]
pub struct HookRegistration {
    /// Owning extension.
    pub extension_id: String,
    /// The hook itself.
    pub hook: HookRef,
    /// Priority captured at registration.
    pub priority: i32,
    /// Whether the hook currently runs.
    pub enabled: bool,
}

impl std::fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistration")
            .field("extension_id", &self.extension_id)
            .field("hook_id", &self.hook.id())
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Central registry for all hooks.
///
/// Hooks are indexed by [`ExtensionPoint`]. Within each point, hooks
/// are kept sorted by priority **descending**; hooks with equal
/// priority keep registration order.
pub struct HookRegistry {
    declared: HashSet<ExtensionPoint>,
    hooks: HashMap<ExtensionPoint, Vec<RegisteredHook>>,
}

impl HookRegistry {
    /// Creates a registry with every builtin point declared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declared: ExtensionPoint::BUILTIN.iter().cloned().collect(),
            hooks: HashMap::new(),
        }
    }

    /// Declares a point. Returns `false` if it was already declared.
    pub fn declare(&mut self, point: ExtensionPoint) -> bool {
        self.declared.insert(point)
    }

    /// Returns `true` if `point` has been declared.
    #[must_use]
    pub fn is_declared(&self, point: &ExtensionPoint) -> bool {
        self.declared.contains(point)
    }

    /// Returns every declared point.
    #[must_use]
    pub fn declared_points(&self) -> Vec<ExtensionPoint> {
        self.declared.iter().cloned().collect()
    }

    /// Registers a hook owned by `extension_id`.
    ///
    /// The hook is inserted after every hook with priority greater
    /// than or equal to its own, so ties run in registration order.
    pub fn register(&mut self, hook: HookRef, extension_id: impl Into<String>) {
        let point = hook.point();
        let priority = hook.priority();
        let entry = self.hooks.entry(point).or_default();

        let pos = entry
            .iter()
            .position(|h| h.priority < priority)
            .unwrap_or(entry.len());
        entry.insert(
            pos,
            RegisteredHook {
                hook,
                extension_id: extension_id.into(),
                priority,
                enabled: true,
            },
        );
    }

    /// Unregisters a hook by ID. Returns `true` if found and removed.
    pub fn unregister(&mut self, hook_id: &str) -> bool {
        let mut found = false;
        for hooks in self.hooks.values_mut() {
            let before = hooks.len();
            hooks.retain(|rh| rh.hook.id() != hook_id);
            found |= hooks.len() < before;
        }
        found
    }

    /// Unregisters all hooks owned by the given extension.
    ///
    /// Returns the number of hooks removed.
    pub fn unregister_by_extension(&mut self, extension_id: &str) -> usize {
        let mut count = 0;
        for hooks in self.hooks.values_mut() {
            let before = hooks.len();
            hooks.retain(|rh| rh.extension_id != extension_id);
            count += before - hooks.len();
        }
        count
    }

    /// Enables or disables a hook by ID. Returns `true` if found.
    pub fn set_enabled(&mut self, hook_id: &str, enabled: bool) -> bool {
        let mut found = false;
        for rh in self.hooks.values_mut().flatten() {
            if rh.hook.id() == hook_id {
                rh.enabled = enabled;
                found = true;
            }
        }
        found
    }

    /// Returns every registration for `point`, in execution order.
    #[must_use]
    pub fn hooks_for(&self, point: &ExtensionPoint) -> Vec<HookRegistration> {
        self.hooks
            .get(point)
            .map(|hooks| {
                hooks
                    .iter()
                    .map(|rh| HookRegistration {
                        extension_id: rh.extension_id.clone(),
                        hook: Arc::clone(&rh.hook),
                        priority: rh.priority,
                        enabled: rh.enabled,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the enabled hooks for `point`, in execution order.
    #[must_use]
    pub fn chain(&self, point: &ExtensionPoint) -> Vec<HookRef> {
        self.hooks
            .get(point)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|rh| rh.enabled)
                    .map(|rh| Arc::clone(&rh.hook))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Returns `true` if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
