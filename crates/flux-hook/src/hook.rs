//! Hook trait, closure-backed hooks, and testing utilities.

use crate::{ExtensionPoint, HookContext, HookError};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What a hook returns: the (possibly rewritten) params, or a failure
/// that stops the chain.
pub type HookResult = Result<Value, HookError>;

/// Shared handle to a hook.
pub type HookRef = Arc<dyn Hook>;

/// A single hook handler.
///
/// Hooks are registered with the [`ExtensionSystem`](crate::ExtensionSystem)
/// as part of an [`Extension`](crate::Extension). Each hook declares:
///
/// - A point (when it fires)
/// - A priority (higher runs earlier; ties keep registration order)
///
/// A hook receives the current params by value and the read-only
/// context by reference. Everything it wants to change goes into the
/// returned params; returning `Err` aborts the whole chain.
///
/// # Thread Safety
///
/// Hooks must be `Send + Sync`: one chain may run on any runtime
/// worker, and the same hook may run in several chains concurrently.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Unique identifier for this hook.
    fn id(&self) -> &str;

    /// Which extension point this hook fires on.
    fn point(&self) -> ExtensionPoint;

    /// Priority (higher = earlier). Default: 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Runs the hook.
    async fn execute(&self, params: Value, ctx: &HookContext) -> HookResult;
}

/// Closure-backed hook.
///
/// The closure receives owned params and an owned copy of the
/// context, so the returned future may be `'static`.
///
/// # Example
///
/// ```
/// use flux_hook::{ExtensionPoint, FnHook, HookRef};
///
/// let hook: HookRef = FnHook::arc("stamp", ExtensionPoint::TaskBeforeExecution, |mut params, _ctx| async move {
///     params["stamped"] = serde_json::json!(true);
///     Ok::<_, flux_hook::HookError>(params)
/// });
/// assert_eq!(hook.id(), "stamp");
/// ```
pub struct FnHook<F> {
    id: String,
    point: ExtensionPoint,
    priority: i32,
    f: F,
}

impl<F> FnHook<F> {
    /// Creates a closure-backed hook with priority 0.
    pub fn new(id: impl Into<String>, point: ExtensionPoint, f: F) -> Self {
        Self {
            id: id.into(),
            point,
            priority: 0,
            f,
        }
    }

    /// Creates the hook and returns it as a shared handle.
    pub fn arc<Fut>(id: impl Into<String>, point: ExtensionPoint, f: F) -> HookRef
    where
        F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Arc::new(Self::new(id, point, f))
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn point(&self) -> ExtensionPoint {
        self.point.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn execute(&self, params: Value, ctx: &HookContext) -> HookResult {
        (self.f)(params, ctx.clone()).await
    }
}

/// Test utilities for the hook system.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type ActionFn = Box<dyn Fn(Value, &HookContext) -> HookResult + Send + Sync>;

    /// A synchronous mock hook for testing.
    ///
    /// Tracks invocation count via `call_count`.
    pub struct MockHook {
        /// Hook ID.
        pub id: String,
        /// Extension point.
        pub point: ExtensionPoint,
        /// Priority.
        pub priority: i32,
        /// The action run on every execute() call.
        pub action_fn: ActionFn,
        /// Number of times execute() has been called.
        pub call_count: Arc<AtomicUsize>,
    }

    impl MockHook {
        fn with_action(id: &str, point: ExtensionPoint, action_fn: ActionFn) -> Self {
            Self {
                id: id.to_string(),
                point,
                priority: 0,
                action_fn,
                call_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Creates a pass-through mock that returns params unchanged.
        pub fn pass_through(id: &str, point: ExtensionPoint) -> Self {
            Self::with_action(id, point, Box::new(|params, _ctx| Ok(params)))
        }

        /// Creates a mock that modifies params via the given function.
        pub fn modifier(
            id: &str,
            point: ExtensionPoint,
            modifier: impl Fn(&mut Value) + Send + Sync + 'static,
        ) -> Self {
            Self::with_action(
                id,
                point,
                Box::new(move |mut params, _ctx| {
                    modifier(&mut params);
                    Ok(params)
                }),
            )
        }

        /// Creates a mock that appends its own id to `params["trace"]`.
        ///
        /// Useful for asserting execution order.
        pub fn tracer(id: &str, point: ExtensionPoint) -> Self {
            let own_id = id.to_string();
            Self::modifier(id, point, move |params| {
                if !params.is_object() {
                    *params = serde_json::json!({});
                }
                let trace = params
                    .as_object_mut()
                    .map(|obj| obj.entry("trace").or_insert_with(|| serde_json::json!([])));
                if let Some(Value::Array(items)) = trace {
                    items.push(Value::String(own_id.clone()));
                }
            })
        }

        /// Creates a mock that rejects with the given reason.
        pub fn rejecter(id: &str, point: ExtensionPoint, reason: &str) -> Self {
            let hook_id = id.to_string();
            let reason = reason.to_string();
            Self::with_action(
                id,
                point,
                Box::new(move |_params, _ctx| Err(HookError::rejected(&hook_id, &reason))),
            )
        }

        /// Sets the priority.
        #[must_use]
        pub fn with_priority(mut self, priority: i32) -> Self {
            self.priority = priority;
            self
        }

        /// Returns the number of times this hook has been executed.
        pub fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Hook for MockHook {
        fn id(&self) -> &str {
            &self.id
        }

        fn point(&self) -> ExtensionPoint {
            self.point.clone()
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn execute(&self, params: Value, ctx: &HookContext) -> HookResult {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            (self.action_fn)(params, ctx)
        }
    }
}
