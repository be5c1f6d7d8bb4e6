//! Runtime: one extension system, event bus, process engine, task
//! executor, and plugin table behind a single API.
//!
//! # Composition
//!
//! ```text
//!                       ┌──────────────────┐
//!   host ──────────────►│     Runtime      │◄───── plugins (hooks + lifecycle)
//!                       └────────┬─────────┘
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!    ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!    │ ProcessEngine │   │ TaskExecutor  │   │   EventBus    │
//!    └───────┬───────┘   └───────┬───────┘   └───────▲───────┘
//!            │    domain events  └───────────────────┤
//!            └───────────────────────────────────────┘
//!                 all three run hooks through the shared ExtensionSystem
//! ```

use crate::config::FluxConfig;
use crate::{PluginError, PluginRef, PluginState, RuntimeError};
use chrono::{DateTime, Utc};
use flux_event::{
    DeliveryReport, DomainEvent, EventBus, EventStorage, HandlerRef, InMemoryEventStorage,
    ReplayReport, Subscription,
};
use flux_hook::{Extension, ExtensionPoint, ExtensionSystem, HookError};
use flux_process::{
    CreateOptions, ProcessCheckpoint, ProcessDefinition, ProcessEngine, ProcessInstance,
};
use flux_task::{TaskDefinition, TaskExecution, TaskExecutor};
use flux_types::{CheckpointId, ExecutionId, ProcessId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity of a runtime, passed to `system:init` and to plugins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeOptions {
    pub version: String,
    pub namespace: String,
    /// Handed to hooks and plugins unvalidated.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").into(),
            namespace: "default".into(),
            metadata: Map::new(),
        }
    }
}

impl RuntimeOptions {
    /// Creates options with empty metadata.
    pub fn new(version: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            namespace: namespace.into(),
            metadata: Map::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

struct PluginEntry {
    plugin: PluginRef,
    state: PluginState,
}

#[derive(Default)]
struct Identity {
    options: RuntimeOptions,
    initialized: bool,
}

/// The composed runtime.
///
/// # Concurrency
///
/// Process, task, and event operations run concurrently. Plugin
/// registration and lifecycle calls (`initialize`, `start`, `stop`,
/// `shutdown`, `register_plugin`, `unregister_plugin`) are serialized
/// by an async lifecycle lock, since plugin methods are awaited.
///
/// # Example
///
/// ```
/// use flux_process::{CreateOptions, ProcessDefinition};
/// use flux_runtime::{Runtime, RuntimeOptions};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let runtime = Runtime::new();
/// runtime
///     .initialize(RuntimeOptions::new("1.0.0", "orders"))
///     .await
///     .expect("init");
/// runtime
///     .register_process_definition(
///         ProcessDefinition::new("order-v1", "order", "draft").transition("draft", "submit", "submitted"),
///     )
///     .expect("register");
///
/// let order = runtime
///     .create_process("order", json!({"total": 12}), CreateOptions::default())
///     .await
///     .expect("create");
/// let order = runtime
///     .transition_process(order.id, "submit", json!({}))
///     .await
///     .expect("submit");
/// assert_eq!(order.state, "submitted");
/// # }
/// ```
pub struct Runtime {
    extensions: Arc<ExtensionSystem>,
    bus: Arc<EventBus>,
    processes: Arc<ProcessEngine>,
    tasks: Arc<TaskExecutor>,
    plugins: RwLock<Vec<PluginEntry>>,
    identity: RwLock<Identity>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with a fresh extension system and no
    /// persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::with_extensions(Arc::new(ExtensionSystem::new()))
    }

    /// Creates a runtime around an existing extension system.
    #[must_use]
    pub fn with_extensions(extensions: Arc<ExtensionSystem>) -> Self {
        let bus = Arc::new(EventBus::new(Arc::clone(&extensions)));
        let processes = Arc::new(ProcessEngine::new(
            Arc::clone(&extensions),
            Arc::clone(&bus),
        ));
        let tasks = Arc::new(TaskExecutor::new(Arc::clone(&extensions), Arc::clone(&bus)));
        Self {
            extensions,
            bus,
            processes,
            tasks,
            plugins: RwLock::new(Vec::new()),
            identity: RwLock::new(Identity::default()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a runtime from loaded configuration.
    ///
    /// Honors `hooks.max_depth` and `events.persistence` /
    /// `events.retention_secs`. The `[runtime]` section becomes the
    /// default options; call [`initialize`](Self::initialize) with
    /// [`FluxConfig::runtime_options`] to go live.
    #[must_use]
    pub fn from_config(config: &FluxConfig) -> Self {
        let runtime = Self::with_extensions(Arc::new(ExtensionSystem::with_max_depth(
            config.hooks.max_depth,
        )));
        if config.events.persistence {
            let storage = match config.events.retention() {
                Some(retention) => InMemoryEventStorage::with_retention(retention),
                None => InMemoryEventStorage::new(),
            };
            runtime.bus.enable_persistence(Arc::new(storage));
        }
        runtime.identity.write().options = config.runtime_options();
        debug!(
            namespace = %config.runtime.namespace,
            persistence = config.events.persistence,
            max_depth = config.hooks.max_depth,
            "runtime built from config"
        );
        runtime
    }

    // === Accessors ===

    #[must_use]
    pub fn extensions(&self) -> &Arc<ExtensionSystem> {
        &self.extensions
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    #[must_use]
    pub fn processes(&self) -> &Arc<ProcessEngine> {
        &self.processes
    }

    #[must_use]
    pub fn tasks(&self) -> &Arc<TaskExecutor> {
        &self.tasks
    }

    /// Current options (defaults until initialized).
    #[must_use]
    pub fn options(&self) -> RuntimeOptions {
        self.identity.read().options.clone()
    }

    /// Returns `true` after a successful [`initialize`](Self::initialize).
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.identity.read().initialized
    }

    // === Lifecycle ===

    /// Runs `system:init` with `{version, namespace, metadata}`.
    ///
    /// On success the options become the runtime identity and the
    /// extension system's config, visible to hooks as `ctx.config`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::AlreadyInitialized`] on a second call
    /// - [`RuntimeError::Hook`] if a `system:init` hook rejects; the
    ///   runtime stays uninitialized
    pub async fn initialize(&self, options: RuntimeOptions) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        if self.is_initialized() {
            return Err(RuntimeError::AlreadyInitialized);
        }

        let params = serde_json::to_value(&options)
            .map_err(|e| HookError::failed("system:init", e.to_string()))?;
        let params = self
            .extensions
            .execute_extension_point(ExtensionPoint::SystemInit, params)
            .await?;
        self.extensions.set_config(params);

        info!(
            version = %options.version,
            namespace = %options.namespace,
            plugins = self.plugins.read().len(),
            "runtime initialized"
        );
        let mut identity = self.identity.write();
        identity.options = options;
        identity.initialized = true;
        Ok(())
    }

    /// Shuts the runtime down.
    ///
    /// Runs `system:shutdown`, stops started plugins in reverse
    /// registration order, then cleans up every plugin in reverse order
    /// and removes its extension. Every step runs even if an earlier
    /// one failed; the first failure is returned.
    ///
    /// # Errors
    ///
    /// The first hook or plugin failure encountered.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        let mut first_error: Option<RuntimeError> = None;

        let params = serde_json::json!({ "namespace": self.options().namespace });
        if let Err(e) = self
            .extensions
            .execute_extension_point(ExtensionPoint::SystemShutdown, params)
            .await
        {
            warn!(error = %e, "system:shutdown hook failed");
            first_error.get_or_insert(e.into());
        }

        let entries = self.plugin_snapshot();
        for (id, plugin, state) in entries.iter().rev() {
            if *state != PluginState::Started {
                continue;
            }
            match plugin.stop().await {
                Ok(()) => self.set_state(id, PluginState::Stopped),
                Err(e) => {
                    warn!(plugin = %id, error = %e, "plugin stop failed during shutdown");
                    first_error.get_or_insert(PluginError::lifecycle(id, "stop", &e).into());
                }
            }
        }
        for (id, plugin, state) in entries.iter().rev() {
            if *state == PluginState::CleanedUp {
                continue;
            }
            if let Err(e) = plugin.cleanup().await {
                warn!(plugin = %id, error = %e, "plugin cleanup failed during shutdown");
                first_error.get_or_insert(PluginError::lifecycle(id, "cleanup", &e).into());
            }
            self.set_state(id, PluginState::CleanedUp);
            if let Err(e) = self.extensions.unregister_extension(id) {
                warn!(plugin = %id, error = %e, "plugin extension not removed");
            }
        }

        self.identity.write().initialized = false;
        info!(plugins = entries.len(), "runtime shut down");
        first_error.map_or(Ok(()), Err)
    }

    // === Plugins ===

    /// Registers a plugin: its hooks become an extension with the
    /// plugin's id, then `initialize` runs with the current options.
    ///
    /// If `initialize` fails the extension is removed again, so no
    /// partial registration remains.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Duplicate`] if the id is taken
    /// - [`PluginError::Registration`] if the extension is rejected
    ///   (missing dependency, undeclared point, id used by an extension)
    /// - [`PluginError::Lifecycle`] if `initialize` fails
    pub async fn register_plugin(&self, plugin: PluginRef) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        let id = plugin.id().to_string();
        if self.plugin_entry(&id).is_some() {
            return Err(PluginError::Duplicate(id).into());
        }

        let mut extension =
            Extension::new(id.clone(), plugin.name()).with_description(plugin.description());
        for dependency in plugin.dependencies() {
            extension = extension.depends_on(dependency);
        }
        for hook in plugin.hooks() {
            extension = extension.with_hook(hook);
        }
        self.extensions
            .register_extension(extension)
            .map_err(|source| PluginError::Registration {
                plugin: id.clone(),
                source,
            })?;
        self.plugins.write().push(PluginEntry {
            plugin: Arc::clone(&plugin),
            state: PluginState::Uninitialized,
        });

        let options = self.options();
        if let Err(e) = plugin.initialize(&options).await {
            self.plugins.write().retain(|entry| entry.plugin.id() != id);
            if let Err(rollback) = self.extensions.unregister_extension(&id) {
                warn!(plugin = %id, error = %rollback, "rollback left extension registered");
            }
            warn!(plugin = %id, error = %e, "plugin initialize failed, registration rolled back");
            return Err(PluginError::lifecycle(&id, "initialize", &e).into());
        }

        self.set_state(&id, PluginState::Initialized);
        info!(plugin = %id, "plugin registered");
        Ok(())
    }

    /// Stops (if started), cleans up, and removes a plugin and its
    /// extension.
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotFound`] if no such plugin
    /// - [`PluginError::Registration`] wrapping
    ///   [`HookError::HasDependents`] if other extensions depend on it;
    ///   nothing is stopped in that case
    /// - [`PluginError::Lifecycle`] if `stop` or `cleanup` fails; the
    ///   plugin stays registered
    pub async fn unregister_plugin(&self, id: &str) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        let (plugin, state) = self
            .plugin_entry(id)
            .ok_or_else(|| PluginError::NotFound(id.to_string()))?;

        let dependents: Vec<String> = self
            .extensions
            .extensions()
            .into_iter()
            .filter(|e| e.dependencies.iter().any(|d| d == id))
            .map(|e| e.id)
            .collect();
        if !dependents.is_empty() {
            return Err(PluginError::Registration {
                plugin: id.to_string(),
                source: HookError::HasDependents {
                    extension: id.to_string(),
                    dependents,
                },
            }
            .into());
        }

        if state == PluginState::Started {
            plugin
                .stop()
                .await
                .map_err(|e| PluginError::lifecycle(id, "stop", &e))?;
            self.set_state(id, PluginState::Stopped);
        }
        if state != PluginState::CleanedUp {
            plugin
                .cleanup()
                .await
                .map_err(|e| PluginError::lifecycle(id, "cleanup", &e))?;
        }
        if self.extensions.has_extension(id) {
            self.extensions
                .unregister_extension(id)
                .map_err(|source| PluginError::Registration {
                    plugin: id.to_string(),
                    source,
                })?;
        }
        self.plugins.write().retain(|entry| entry.plugin.id() != id);
        info!(plugin = %id, "plugin unregistered");
        Ok(())
    }

    /// Lifecycle state of a plugin.
    #[must_use]
    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        self.plugin_entry(id).map(|(_, state)| state)
    }

    /// Plugin ids in registration order.
    #[must_use]
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins
            .read()
            .iter()
            .map(|entry| entry.plugin.id().to_string())
            .collect()
    }

    /// Starts plugins in registration order, stopping at the first
    /// failure. Already started plugins are skipped.
    ///
    /// # Errors
    ///
    /// - [`PluginError::InvalidState`] for a cleaned-up plugin
    /// - [`PluginError::Lifecycle`] for the first `start` that fails;
    ///   plugins after it are not started
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        for (id, plugin, state) in self.plugin_snapshot() {
            if state == PluginState::Started {
                continue;
            }
            if !state.can_start() {
                return Err(PluginError::InvalidState {
                    plugin: id,
                    state,
                    operation: "start",
                }
                .into());
            }
            plugin
                .start()
                .await
                .map_err(|e| PluginError::lifecycle(&id, "start", &e))?;
            self.set_state(&id, PluginState::Started);
            debug!(plugin = %id, "plugin started");
        }
        Ok(())
    }

    /// Stops started plugins in reverse registration order, stopping at
    /// the first failure.
    ///
    /// # Errors
    ///
    /// [`PluginError::Lifecycle`] for the first `stop` that fails;
    /// plugins before it stay started.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        let _guard = self.lifecycle.lock().await;
        for (id, plugin, state) in self.plugin_snapshot().into_iter().rev() {
            if state != PluginState::Started {
                continue;
            }
            plugin
                .stop()
                .await
                .map_err(|e| PluginError::lifecycle(&id, "stop", &e))?;
            self.set_state(&id, PluginState::Stopped);
            debug!(plugin = %id, "plugin stopped");
        }
        Ok(())
    }

    // === Processes ===

    /// See [`ProcessEngine::register_definition`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Process`] for an invalid or duplicate definition.
    pub fn register_process_definition(
        &self,
        definition: ProcessDefinition,
    ) -> Result<(), RuntimeError> {
        Ok(self.processes.register_definition(definition)?)
    }

    /// See [`ProcessEngine::create_process`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Process`].
    pub async fn create_process(
        &self,
        process_type: &str,
        data: Value,
        options: CreateOptions,
    ) -> Result<ProcessInstance, RuntimeError> {
        Ok(self
            .processes
            .create_process(process_type, data, options)
            .await?)
    }

    /// Applies `event_type` to a process. See
    /// [`ProcessEngine::apply_event`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Process`].
    pub async fn transition_process(
        &self,
        process_id: ProcessId,
        event_type: &str,
        payload: Value,
    ) -> Result<ProcessInstance, RuntimeError> {
        Ok(self
            .processes
            .apply_event(process_id, event_type, payload)
            .await?)
    }

    /// # Errors
    ///
    /// [`RuntimeError::Process`] if the process does not exist.
    pub async fn get_process(&self, process_id: ProcessId) -> Result<ProcessInstance, RuntimeError> {
        Ok(self.processes.get_process(process_id).await?)
    }

    /// # Errors
    ///
    /// [`RuntimeError::Process`] if the process does not exist.
    pub async fn save_checkpoint(
        &self,
        process_id: ProcessId,
    ) -> Result<ProcessCheckpoint, RuntimeError> {
        Ok(self.processes.save_checkpoint(process_id).await?)
    }

    /// # Errors
    ///
    /// [`RuntimeError::Process`] if the process or checkpoint does not
    /// exist.
    pub async fn restore_from_checkpoint(
        &self,
        process_id: ProcessId,
        checkpoint_id: CheckpointId,
    ) -> Result<ProcessInstance, RuntimeError> {
        Ok(self
            .processes
            .restore_from_checkpoint(process_id, checkpoint_id)
            .await?)
    }

    // === Tasks ===

    /// # Errors
    ///
    /// [`RuntimeError::Task`] for an invalid or duplicate definition.
    pub fn register_task(&self, definition: TaskDefinition) -> Result<(), RuntimeError> {
        Ok(self.tasks.register_task(definition)?)
    }

    /// See [`TaskExecutor::execute_task`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Task`].
    pub async fn execute_task(&self, task_id: &str, input: Value) -> Result<TaskExecution, RuntimeError> {
        Ok(self.tasks.execute_task(task_id, input).await?)
    }

    /// See [`TaskExecutor::execute_task_with_dependencies`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Task`].
    pub async fn execute_task_with_dependencies(
        &self,
        task_id: &str,
        input: Value,
        dependencies: &[String],
    ) -> Result<TaskExecution, RuntimeError> {
        Ok(self
            .tasks
            .execute_task_with_dependencies(task_id, input, dependencies)
            .await?)
    }

    /// Cancels a running execution.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Task`] if the execution is not running.
    pub fn cancel_task(&self, execution_id: ExecutionId) -> Result<(), RuntimeError> {
        Ok(self.tasks.cancel_execution(execution_id)?)
    }

    // === Events ===

    /// # Errors
    ///
    /// [`RuntimeError::Event`] if a publish hook or the store fails.
    pub async fn publish(&self, event: DomainEvent) -> Result<DeliveryReport, RuntimeError> {
        Ok(self.bus.publish(event).await?)
    }

    pub fn subscribe(&self, event_type: impl Into<String>, handler: HandlerRef) -> Subscription {
        self.bus.subscribe(event_type, handler)
    }

    /// Returns `true` if the subscription was active.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    pub fn enable_persistence(&self, storage: Arc<dyn EventStorage>) {
        self.bus.enable_persistence(storage);
    }

    pub fn disable_persistence(&self) {
        self.bus.disable_persistence();
    }

    /// # Errors
    ///
    /// [`RuntimeError::Event`] without persistence or on store failure.
    pub async fn persist_event(&self, event: &DomainEvent) -> Result<(), RuntimeError> {
        Ok(self.bus.persist_event(event).await?)
    }

    /// See [`EventBus::replay_events`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Event`].
    pub async fn replay_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        event_types: Option<Vec<String>>,
    ) -> Result<ReplayReport, RuntimeError> {
        Ok(self.bus.replay_events(from, to, event_types).await?)
    }

    /// Stored events sharing a correlation id, in publish order.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Event`] without persistence.
    pub async fn correlate_events(&self, correlation_id: &str) -> Result<Vec<DomainEvent>, RuntimeError> {
        Ok(self.bus.correlate(correlation_id).await?)
    }

    // === Internals ===

    fn plugin_entry(&self, id: &str) -> Option<(PluginRef, PluginState)> {
        self.plugins
            .read()
            .iter()
            .find(|entry| entry.plugin.id() == id)
            .map(|entry| (Arc::clone(&entry.plugin), entry.state))
    }

    fn plugin_snapshot(&self) -> Vec<(String, PluginRef, PluginState)> {
        self.plugins
            .read()
            .iter()
            .map(|entry| {
                (
                    entry.plugin.id().to_string(),
                    Arc::clone(&entry.plugin),
                    entry.state,
                )
            })
            .collect()
    }

    fn set_state(&self, id: &str, state: PluginState) {
        if let Some(entry) = self
            .plugins
            .write()
            .iter_mut()
            .find(|entry| entry.plugin.id() == id)
        {
            entry.state = state;
        }
    }
}
