//! Extension system: extension registry plus chain execution.
//!
//! # Chain Semantics
//!
//! ```text
//! execute_extension_point(point, params)
//!     │
//!     ▼ snapshot enabled hooks (priority desc, ties FIFO)
//! ┌────────┐  params'  ┌────────┐  params''  ┌────────┐
//! │ hook 1 │ ────────► │ hook 2 │ ─────────► │ hook n │ ──► Ok(final params)
//! └────────┘           └────────┘            └────────┘
//!     │ Err(e)             │ Err(e)
//!     ▼                    ▼
//!   return Err(e); later hooks never run
//! ```
//!
//! The chain is snapshotted under a read lock and run without any
//! lock held, so hooks may suspend and may even register or
//! unregister extensions; a running chain is unaffected by such
//! changes.

use crate::{
    Extension, ExtensionInfo, ExtensionPoint, HookContext, HookError, HookRegistration,
    HookRegistry, DEFAULT_MAX_DEPTH,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Inner {
    registry: HookRegistry,
    /// Registered extensions, in registration order.
    extensions: Vec<ExtensionInfo>,
}

/// Registry of extensions and executor of extension-point chains.
///
/// # Concurrency
///
/// Registration, unregistration, and chain snapshots are atomic with
/// respect to each other: no caller observes a half-registered
/// extension.
pub struct ExtensionSystem {
    inner: RwLock<Inner>,
    config: RwLock<Arc<Value>>,
    max_depth: u8,
}

impl ExtensionSystem {
    /// Creates a system with the builtin points declared and no extensions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates a system with a custom nesting limit.
    #[must_use]
    pub fn with_max_depth(max_depth: u8) -> Self {
        Self {
            inner: RwLock::new(Inner {
                registry: HookRegistry::new(),
                extensions: Vec::new(),
            }),
            config: RwLock::new(Arc::new(Value::Null)),
            max_depth,
        }
    }

    /// Replaces the configuration snapshot handed to hooks.
    pub fn set_config(&self, config: Value) {
        *self.config.write() = Arc::new(config);
    }

    /// Returns the current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<Value> {
        Arc::clone(&self.config.read())
    }

    /// Declares an extension point. Returns `false` if already declared.
    pub fn register_extension_point(&self, point: ExtensionPoint) -> bool {
        let added = self.inner.write().registry.declare(point.clone());
        if added {
            debug!(point = %point, "extension point declared");
        }
        added
    }

    /// Returns `true` if `point` is declared.
    #[must_use]
    pub fn has_extension_point(&self, point: &ExtensionPoint) -> bool {
        self.inner.read().registry.is_declared(point)
    }

    /// Registers an extension and all of its hooks.
    ///
    /// # Errors
    ///
    /// - [`HookError::DuplicateExtension`] if the id is taken
    /// - [`HookError::MissingDependency`] if a dependency is absent
    /// - [`HookError::UndeclaredPoint`] if a hook targets an undeclared point
    ///
    /// Nothing is registered when an error is returned.
    pub fn register_extension(&self, extension: Extension) -> Result<(), HookError> {
        let mut inner = self.inner.write();

        if inner.extensions.iter().any(|e| e.id == extension.id) {
            return Err(HookError::DuplicateExtension(extension.id));
        }
        if let Some(missing) = extension
            .dependencies
            .iter()
            .find(|dep| !inner.extensions.iter().any(|e| &e.id == *dep))
        {
            return Err(HookError::MissingDependency {
                extension: extension.id.clone(),
                dependency: missing.clone(),
            });
        }
        if let Some(hook) = extension
            .hooks
            .iter()
            .find(|h| !inner.registry.is_declared(&h.point()))
        {
            return Err(HookError::UndeclaredPoint(hook.point().to_string()));
        }

        let info = extension.info();
        for hook in extension.hooks {
            inner.registry.register(hook, info.id.clone());
        }
        info!(
            extension = %info.id,
            hooks = info.hook_ids.len(),
            "extension registered"
        );
        inner.extensions.push(info);
        Ok(())
    }

    /// Unregisters an extension and removes its hooks from every point.
    ///
    /// # Errors
    ///
    /// - [`HookError::ExtensionNotFound`] if no such extension
    /// - [`HookError::HasDependents`] if other extensions depend on it
    pub fn unregister_extension(&self, id: &str) -> Result<(), HookError> {
        let mut inner = self.inner.write();

        let Some(pos) = inner.extensions.iter().position(|e| e.id == id) else {
            return Err(HookError::ExtensionNotFound(id.to_string()));
        };
        let dependents: Vec<String> = inner
            .extensions
            .iter()
            .filter(|e| e.dependencies.iter().any(|d| d == id))
            .map(|e| e.id.clone())
            .collect();
        if !dependents.is_empty() {
            return Err(HookError::HasDependents {
                extension: id.to_string(),
                dependents,
            });
        }

        let removed = inner.registry.unregister_by_extension(id);
        inner.extensions.remove(pos);
        info!(extension = %id, hooks = removed, "extension unregistered");
        Ok(())
    }

    /// Returns `true` if an extension with this id is registered.
    #[must_use]
    pub fn has_extension(&self, id: &str) -> bool {
        self.inner.read().extensions.iter().any(|e| e.id == id)
    }

    /// Returns metadata for one extension.
    #[must_use]
    pub fn extension(&self, id: &str) -> Option<ExtensionInfo> {
        self.inner
            .read()
            .extensions
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Returns metadata for every extension, in registration order.
    #[must_use]
    pub fn extensions(&self) -> Vec<ExtensionInfo> {
        self.inner.read().extensions.clone()
    }

    /// Returns every registration on `point`, in execution order.
    #[must_use]
    pub fn hooks_for(&self, point: &ExtensionPoint) -> Vec<HookRegistration> {
        self.inner.read().registry.hooks_for(point)
    }

    /// Enables or disables a single hook. Returns `true` if found.
    pub fn set_hook_enabled(&self, hook_id: &str, enabled: bool) -> bool {
        self.inner.write().registry.set_enabled(hook_id, enabled)
    }

    /// Total number of registered hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.inner.read().registry.len()
    }

    /// Runs the hook chain for `point` with a fresh top-level context.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure unchanged.
    pub async fn execute_extension_point(
        &self,
        point: ExtensionPoint,
        params: Value,
    ) -> Result<Value, HookError> {
        self.execute_with_metadata(point, params, HashMap::new())
            .await
    }

    /// Runs the hook chain with caller-supplied context metadata.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure unchanged.
    pub async fn execute_with_metadata(
        &self,
        point: ExtensionPoint,
        params: Value,
        metadata: HashMap<String, Value>,
    ) -> Result<Value, HookError> {
        let mut ctx = HookContext::new(point, self.config()).with_max_depth(self.max_depth);
        ctx.metadata = metadata;
        self.run_chain(ctx, params).await
    }

    /// Runs the hook chain for `point` from inside another hook.
    ///
    /// The nested context inherits metadata and has its depth
    /// incremented.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::DepthExceeded`] once the nesting limit is
    /// reached, otherwise the first hook failure.
    pub async fn execute_nested(
        &self,
        point: ExtensionPoint,
        params: Value,
        parent: &HookContext,
    ) -> Result<Value, HookError> {
        self.run_chain(parent.nested(point), params).await
    }

    async fn run_chain(&self, ctx: HookContext, mut params: Value) -> Result<Value, HookError> {
        if ctx.is_depth_exceeded() {
            warn!(
                point = %ctx.point,
                depth = ctx.depth,
                max_depth = ctx.max_depth,
                "extension point nesting limit reached"
            );
            return Err(HookError::DepthExceeded {
                depth: ctx.depth,
                max_depth: ctx.max_depth,
            });
        }

        let chain = self.inner.read().registry.chain(&ctx.point);
        if chain.is_empty() {
            return Ok(params);
        }

        debug!(point = %ctx.point, hooks = chain.len(), "executing extension point");
        for hook in chain {
            match hook.execute(params, &ctx).await {
                Ok(next) => params = next,
                Err(e) => {
                    warn!(
                        point = %ctx.point,
                        hook_id = hook.id(),
                        error = %e,
                        "hook failed, stopping chain"
                    );
                    return Err(e);
                }
            }
        }
        Ok(params)
    }
}

impl Default for ExtensionSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::testing::MockHook;
    use crate::FnHook;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const POINT: ExtensionPoint = ExtensionPoint::ProcessBeforeCreate;

    fn ext_with(id: &str, hooks: Vec<MockHook>) -> Extension {
        hooks
            .into_iter()
            .fold(Extension::new(id, id), |ext, h| ext.with_hook(Arc::new(h)))
    }

    // ── Chain execution ──────────────────────────────────────

    #[tokio::test]
    async fn no_hooks_returns_params_unchanged() {
        let sys = ExtensionSystem::new();
        let out = sys
            .execute_extension_point(POINT, json!({"x": 1}))
            .await
            .expect("empty chain should succeed");
        assert_eq!(out, json!({"x": 1}));
    }

    #[tokio::test]
    async fn hooks_run_in_descending_priority_regardless_of_registration_order() {
        let sys = ExtensionSystem::new();
        sys.register_extension(ext_with(
            "a",
            vec![
                MockHook::tracer("p1", POINT).with_priority(1),
                MockHook::tracer("p50", POINT).with_priority(50),
            ],
        ))
        .expect("register a");
        sys.register_extension(ext_with(
            "b",
            vec![
                MockHook::tracer("p10", POINT).with_priority(10),
                MockHook::tracer("p100", POINT).with_priority(100),
            ],
        ))
        .expect("register b");

        let out = sys
            .execute_extension_point(POINT, json!({}))
            .await
            .expect("chain should succeed");
        assert_eq!(out["trace"], json!(["p100", "p50", "p10", "p1"]));
    }

    #[tokio::test]
    async fn each_hook_sees_previous_rewrite() {
        let sys = ExtensionSystem::new();
        sys.register_extension(ext_with(
            "math",
            vec![
                MockHook::modifier("double", POINT, |p| {
                    p["n"] = json!(p["n"].as_i64().unwrap_or(0) * 2);
                })
                .with_priority(2),
                MockHook::modifier("inc", POINT, |p| {
                    p["n"] = json!(p["n"].as_i64().unwrap_or(0) + 1);
                })
                .with_priority(1),
            ],
        ))
        .expect("register");

        let out = sys
            .execute_extension_point(POINT, json!({"n": 5}))
            .await
            .expect("chain should succeed");
        assert_eq!(out["n"], json!(11));
    }

    #[tokio::test]
    async fn failure_short_circuits_and_returns_that_error() {
        let sys = ExtensionSystem::new();
        let first = MockHook::pass_through("first", POINT).with_priority(30);
        let reject = MockHook::rejecter("guard", POINT, "quota").with_priority(20);
        let later = MockHook::pass_through("later", POINT).with_priority(10);
        let first_calls = Arc::clone(&first.call_count);
        let later_calls = Arc::clone(&later.call_count);

        sys.register_extension(ext_with("ext", vec![first, reject, later]))
            .expect("register");

        let err = sys
            .execute_extension_point(POINT, json!({}))
            .await
            .expect_err("chain should fail");
        assert_eq!(err, HookError::rejected("guard", "quota"));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hooks_on_other_points_do_not_run() {
        let sys = ExtensionSystem::new();
        let other = MockHook::rejecter("other", ExtensionPoint::TaskError, "no");
        sys.register_extension(ext_with("ext", vec![other]))
            .expect("register");
        assert!(sys
            .execute_extension_point(POINT, json!(null))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn disabled_hook_is_skipped() {
        let sys = ExtensionSystem::new();
        sys.register_extension(ext_with(
            "ext",
            vec![MockHook::rejecter("veto", POINT, "no")],
        ))
        .expect("register");
        assert!(sys.set_hook_enabled("veto", false));
        assert!(sys
            .execute_extension_point(POINT, json!(null))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn hooks_receive_config_and_metadata() {
        let sys = ExtensionSystem::new();
        sys.set_config(json!({"namespace": "acme"}));
        let hook = FnHook::arc("reader", POINT, |_params, ctx: HookContext| async move {
            Ok::<_, HookError>(json!({
                "namespace": ctx.config["namespace"].clone(),
                "op": ctx.meta("op").cloned(),
            }))
        });
        sys.register_extension(Extension::new("ext", "ext").with_hook(hook))
            .expect("register");

        let mut metadata = HashMap::new();
        metadata.insert("op".to_string(), json!("create"));
        let out = sys
            .execute_with_metadata(POINT, json!(null), metadata)
            .await
            .expect("chain should succeed");
        assert_eq!(out, json!({"namespace": "acme", "op": "create"}));
    }

    #[tokio::test]
    async fn nested_execution_hits_depth_limit() {
        let sys = ExtensionSystem::with_max_depth(2);
        let ctx = HookContext::new(POINT, sys.config()).with_max_depth(2);
        let nested = ctx.nested(POINT);
        assert!(sys
            .execute_nested(POINT, json!(null), &ctx)
            .await
            .is_ok());
        let err = sys
            .execute_nested(POINT, json!(null), &nested)
            .await
            .expect_err("depth 2 should be rejected");
        assert!(matches!(err, HookError::DepthExceeded { depth: 2, max_depth: 2 }));
    }

    // ── Registration ─────────────────────────────────────────

    #[test]
    fn duplicate_extension_rejected() {
        let sys = ExtensionSystem::new();
        sys.register_extension(Extension::new("a", "A")).expect("first");
        let err = sys
            .register_extension(Extension::new("a", "A again"))
            .expect_err("duplicate");
        assert_eq!(err, HookError::DuplicateExtension("a".into()));
    }

    #[test]
    fn missing_dependency_rejected_and_nothing_registered() {
        let sys = ExtensionSystem::new();
        let ext = ext_with("child", vec![MockHook::pass_through("h", POINT)]).depends_on("parent");
        let err = sys.register_extension(ext).expect_err("missing dep");
        assert!(matches!(err, HookError::MissingDependency { ref dependency, .. } if dependency == "parent"));
        assert!(!sys.has_extension("child"));
        assert_eq!(sys.hook_count(), 0);
    }

    #[test]
    fn dependency_satisfied_in_order() {
        let sys = ExtensionSystem::new();
        sys.register_extension(Extension::new("parent", "P")).expect("parent");
        sys.register_extension(Extension::new("child", "C").depends_on("parent"))
            .expect("child");
        let ids: Vec<_> = sys.extensions().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["parent", "child"]);
    }

    #[test]
    fn cycle_manifests_as_missing_dependency() {
        let sys = ExtensionSystem::new();
        let a = Extension::new("a", "A").depends_on("b");
        let b = Extension::new("b", "B").depends_on("a");
        assert!(matches!(
            sys.register_extension(a),
            Err(HookError::MissingDependency { .. })
        ));
        assert!(matches!(
            sys.register_extension(b),
            Err(HookError::MissingDependency { .. })
        ));
    }

    #[test]
    fn undeclared_point_rejected() {
        let sys = ExtensionSystem::new();
        let point = ExtensionPoint::Custom("metrics:flush".into());
        let ext = ext_with("m", vec![MockHook::pass_through("h", point.clone())]);
        assert_eq!(
            sys.register_extension(ext.clone()),
            Err(HookError::UndeclaredPoint("metrics:flush".into()))
        );

        assert!(sys.register_extension_point(point.clone()));
        assert!(sys.has_extension_point(&point));
        sys.register_extension(ext).expect("declared now");
    }

    #[tokio::test]
    async fn unregister_removes_hooks_from_every_point() {
        let sys = ExtensionSystem::new();
        sys.register_extension(ext_with(
            "ext",
            vec![
                MockHook::rejecter("a", POINT, "no"),
                MockHook::rejecter("b", ExtensionPoint::TaskError, "no"),
            ],
        ))
        .expect("register");
        assert_eq!(sys.hook_count(), 2);

        sys.unregister_extension("ext").expect("unregister");
        assert_eq!(sys.hook_count(), 0);
        assert!(sys
            .execute_extension_point(POINT, json!(null))
            .await
            .is_ok());
    }

    #[test]
    fn unregister_unknown_extension() {
        let sys = ExtensionSystem::new();
        assert_eq!(
            sys.unregister_extension("ghost"),
            Err(HookError::ExtensionNotFound("ghost".into()))
        );
    }

    #[test]
    fn unregister_blocked_by_dependents() {
        let sys = ExtensionSystem::new();
        sys.register_extension(Extension::new("core", "Core")).expect("core");
        sys.register_extension(Extension::new("addon", "Addon").depends_on("core"))
            .expect("addon");

        let err = sys.unregister_extension("core").expect_err("has dependents");
        assert!(matches!(err, HookError::HasDependents { ref dependents, .. } if dependents == &vec!["addon".to_string()]));

        sys.unregister_extension("addon").expect("addon first");
        sys.unregister_extension("core").expect("then core");
    }
}
