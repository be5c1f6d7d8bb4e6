//! ProcessEngine: definitions, instances, transitions, checkpoints.
//!
//! # Transition Pipeline
//!
//! ```text
//! apply_event(id, event, payload)
//!     │
//!     ▼ lock instance            (per-instance async mutex)
//!     ▼ resolve transition       (pinned definition, first match with passing guard)
//!     ▼ process:beforeTransition (may rewrite payload or reject)
//!     ▼ exit action [from] → entry action [to]
//!     ▼ state = to, updatedAt = now
//!     ▼ process:afterTransition  (may reject; nothing is committed)
//!     ▼ commit to store
//!     ▼ publish process:transitioned
//! ```
//!
//! A failure at any step before the commit leaves the stored instance
//! untouched.

use crate::definition::compare_versions;
use crate::{
    events, ActionContext, CreateOptions, InMemoryProcessStore, ProcessCheckpoint,
    ProcessDefinition, ProcessError, ProcessInstance, ProcessStore, RecoveryInfo,
};
use chrono::Utc;
use flux_event::{DomainEvent, EventBus};
use flux_hook::{ExtensionPoint, ExtensionSystem};
use flux_types::{CheckpointId, ProcessId};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Definitions {
    by_id: HashMap<String, ProcessDefinition>,
    /// Definition ids per name, in registration order.
    by_name: HashMap<String, Vec<String>>,
}

impl Definitions {
    fn versions_of(&self, name: &str) -> impl Iterator<Item = &ProcessDefinition> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
    }
}

type LockTable = Mutex<HashMap<ProcessId, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one instance's lock. On drop the table entry is removed once
/// no other caller holds or waits on it, so the table only tracks
/// instances with operations in progress.
struct InstanceLock<'a> {
    locks: &'a LockTable,
    process_id: ProcessId,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for InstanceLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        if locks
            .get(&self.process_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.process_id);
        }
    }
}

/// State-machine engine.
///
/// # Concurrency
///
/// Transitions and restores on one instance are serialized by a
/// per-instance `tokio::sync::Mutex`; different instances proceed
/// concurrently. The definition table is guarded by a
/// `parking_lot::RwLock` that is never held across `.await`.
pub struct ProcessEngine {
    extensions: Arc<ExtensionSystem>,
    bus: Arc<EventBus>,
    store: Arc<dyn ProcessStore>,
    definitions: RwLock<Definitions>,
    locks: LockTable,
}

impl ProcessEngine {
    /// Creates an engine backed by an [`InMemoryProcessStore`].
    #[must_use]
    pub fn new(extensions: Arc<ExtensionSystem>, bus: Arc<EventBus>) -> Self {
        Self::with_store(extensions, bus, Arc::new(InMemoryProcessStore::new()))
    }

    /// Creates an engine backed by `store`.
    #[must_use]
    pub fn with_store(
        extensions: Arc<ExtensionSystem>,
        bus: Arc<EventBus>,
        store: Arc<dyn ProcessStore>,
    ) -> Self {
        Self {
            extensions,
            bus,
            store,
            definitions: RwLock::new(Definitions::default()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    // === Definitions ===

    /// Registers a definition.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::InvalidDefinition`] if validation fails
    /// - [`ProcessError::DuplicateDefinition`] if the id is taken
    /// - [`ProcessError::DuplicateVersion`] if `(name, version)` is taken;
    ///   versions are compared numerically, so `1.0` collides with `1`
    pub fn register_definition(&self, definition: ProcessDefinition) -> Result<(), ProcessError> {
        definition.validate()?;

        let mut defs = self.definitions.write();
        if defs.by_id.contains_key(&definition.id) {
            return Err(ProcessError::DuplicateDefinition(definition.id));
        }
        if defs.versions_of(&definition.name).any(|d| {
            compare_versions(d.version.as_deref(), definition.version.as_deref())
                == std::cmp::Ordering::Equal
        }) {
            return Err(ProcessError::DuplicateVersion {
                name: definition.name.clone(),
                version: definition.version_label(),
            });
        }

        debug!(
            definition = %definition.id,
            name = %definition.name,
            version = %definition.version_label(),
            "process definition registered"
        );
        defs.by_name
            .entry(definition.name.clone())
            .or_default()
            .push(definition.id.clone());
        defs.by_id.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Returns a definition by id.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<ProcessDefinition> {
        self.definitions.read().by_id.get(id).cloned()
    }

    /// Every definition registered under `name`, lowest version first.
    #[must_use]
    pub fn definitions_for(&self, name: &str) -> Vec<ProcessDefinition> {
        let defs = self.definitions.read();
        let mut out: Vec<ProcessDefinition> = defs.versions_of(name).cloned().collect();
        out.sort_by(|a, b| compare_versions(a.version.as_deref(), b.version.as_deref()));
        out
    }

    /// Picks the definition for a new instance: the pinned version if
    /// given, otherwise the highest registered one.
    fn resolve(
        &self,
        process_type: &str,
        version: Option<&str>,
    ) -> Result<ProcessDefinition, ProcessError> {
        let defs = self.definitions.read();
        let found = match version {
            Some(v) => defs.versions_of(process_type).find(|d| {
                compare_versions(d.version.as_deref(), Some(v)) == std::cmp::Ordering::Equal
            }),
            None => defs
                .versions_of(process_type)
                .max_by(|a, b| compare_versions(a.version.as_deref(), b.version.as_deref())),
        };
        found.cloned().ok_or_else(|| ProcessError::DefinitionNotFound {
            process_type: process_type.to_string(),
            version: version.map(str::to_string),
        })
    }

    // === Instances ===

    /// Creates an instance of `process_type` in its initial state.
    ///
    /// `process:beforeCreate` receives `{type, version, data}` and may
    /// rewrite `data`; `process:afterCreate` receives the instance.
    /// Nothing is stored unless both succeed.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::DefinitionNotFound`] if no definition matches
    /// - [`ProcessError::Hook`] if a hook rejects
    /// - store failures
    pub async fn create_process(
        &self,
        process_type: &str,
        data: Value,
        options: CreateOptions,
    ) -> Result<ProcessInstance, ProcessError> {
        let definition = self.resolve(process_type, options.version.as_deref())?;

        let params = json!({
            "type": definition.name,
            "version": definition.version,
            "data": data,
        });
        let mut params = self
            .extensions
            .execute_extension_point(ExtensionPoint::ProcessBeforeCreate, params)
            .await?;
        let data = take_field(&mut params, "data")?;

        let now = Utc::now();
        let instance = ProcessInstance {
            id: ProcessId::new(),
            process_type: definition.name.clone(),
            definition_id: definition.id.clone(),
            state: definition.initial_state.clone(),
            data,
            created_at: now,
            updated_at: now,
            version: definition.version.clone(),
            recovery: None,
        };

        self.extensions
            .execute_extension_point(ExtensionPoint::ProcessAfterCreate, to_params(&instance)?)
            .await?;
        self.store.save_instance(&instance).await?;

        info!(
            process = %instance.id,
            process_type = %instance.process_type,
            version = %definition.version_label(),
            state = %instance.state,
            "process created"
        );
        self.emit(
            DomainEvent::new(events::PROCESS_CREATED, to_params(&instance)?)
                .with_correlation_id(instance.id.to_string()),
        )
        .await;
        Ok(instance)
    }

    /// Applies `event_type` to a process.
    ///
    /// The payload is handed to hooks and actions but never merged into
    /// the instance data.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::NotFound`] if the process does not exist
    /// - [`ProcessError::InvalidTransition`] if no transition matches
    /// - [`ProcessError::ActionFailed`] if an entry or exit action fails
    /// - [`ProcessError::Hook`] if a hook rejects
    pub async fn apply_event(
        &self,
        process_id: ProcessId,
        event_type: &str,
        payload: Value,
    ) -> Result<ProcessInstance, ProcessError> {
        let _guard = self.lock_instance(process_id).await;

        let mut instance = self.load(process_id).await?;
        let definition = self.pinned_definition(&instance)?;

        let to = definition
            .find_transition(&instance.state, event_type, &instance.data, &payload)
            .map(|t| t.to.clone())
            .ok_or_else(|| ProcessError::InvalidTransition {
                process_id,
                state: instance.state.clone(),
                event: event_type.to_string(),
            })?;
        let from = instance.state.clone();

        let params = json!({
            "processId": process_id,
            "from": from,
            "to": to,
            "event": event_type,
            "payload": payload,
        });
        let mut params = self
            .extensions
            .execute_extension_point(ExtensionPoint::ProcessBeforeTransition, params)
            .await?;
        let payload = take_field(&mut params, "payload")?;

        let ctx = ActionContext {
            process_id,
            from: from.clone(),
            to: to.clone(),
            event: event_type.to_string(),
            payload,
        };
        let mut data = std::mem::take(&mut instance.data);
        if let Some(action) = definition.exit_actions.get(&from) {
            data = action.run(data, &ctx).await.map_err(|message| ProcessError::ActionFailed {
                phase: "exit",
                state: from.clone(),
                message,
            })?;
        }
        if let Some(action) = definition.entry_actions.get(&to) {
            data = action.run(data, &ctx).await.map_err(|message| ProcessError::ActionFailed {
                phase: "entry",
                state: to.clone(),
                message,
            })?;
        }
        instance.data = data;
        instance.state = to.clone();
        instance.updated_at = Utc::now();

        self.extensions
            .execute_extension_point(
                ExtensionPoint::ProcessAfterTransition,
                json!({
                    "processId": process_id,
                    "from": from,
                    "to": to,
                    "event": event_type,
                    "instance": to_params(&instance)?,
                }),
            )
            .await?;
        self.store.save_instance(&instance).await?;

        info!(
            process = %process_id,
            from = %from,
            to = %to,
            event = %event_type,
            "process transitioned"
        );
        self.emit(
            DomainEvent::new(
                events::PROCESS_TRANSITIONED,
                json!({
                    "processId": process_id,
                    "from": from,
                    "to": to,
                    "event": event_type,
                    "payload": ctx.payload,
                }),
            )
            .with_correlation_id(process_id.to_string()),
        )
        .await;
        Ok(instance)
    }

    /// Returns an instance.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NotFound`] if it does not exist.
    pub async fn get_process(&self, process_id: ProcessId) -> Result<ProcessInstance, ProcessError> {
        self.load(process_id).await
    }

    /// Returns every instance, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_processes(&self) -> Result<Vec<ProcessInstance>, ProcessError> {
        self.store.list_instances().await
    }

    /// Event types that have a transition out of the process's current
    /// state. Guards are not evaluated.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NotFound`] if the process does not exist.
    pub async fn available_events(&self, process_id: ProcessId) -> Result<Vec<String>, ProcessError> {
        let instance = self.load(process_id).await?;
        Ok(self.pinned_definition(&instance)?.events_from(&instance.state))
    }

    // === Checkpoints ===

    /// Snapshots a process's state and data.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NotFound`] if the process does not exist.
    pub async fn save_checkpoint(
        &self,
        process_id: ProcessId,
    ) -> Result<ProcessCheckpoint, ProcessError> {
        let _guard = self.lock_instance(process_id).await;

        let instance = self.load(process_id).await?;
        let checkpoint = ProcessCheckpoint::of(&instance);
        self.store.save_checkpoint(&checkpoint).await?;
        debug!(
            process = %process_id,
            checkpoint = %checkpoint.id,
            state = %checkpoint.state,
            "checkpoint saved"
        );
        Ok(checkpoint)
    }

    /// Restores a process to a checkpoint's state and data.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::NotFound`] if the process does not exist
    /// - [`ProcessError::CheckpointNotFound`] if the checkpoint does not
    ///   exist or belongs to another process
    pub async fn restore_from_checkpoint(
        &self,
        process_id: ProcessId,
        checkpoint_id: CheckpointId,
    ) -> Result<ProcessInstance, ProcessError> {
        let _guard = self.lock_instance(process_id).await;

        let mut instance = self.load(process_id).await?;
        let checkpoint = self
            .store
            .load_checkpoint(checkpoint_id)
            .await?
            .filter(|cp| cp.process_id == process_id)
            .ok_or(ProcessError::CheckpointNotFound(checkpoint_id))?;

        instance.state = checkpoint.state;
        instance.data = checkpoint.data;
        instance.updated_at = Utc::now();
        instance.recovery = Some(RecoveryInfo {
            checkpoint_id,
            last_saved_at: checkpoint.created_at,
        });
        self.store.save_instance(&instance).await?;

        info!(
            process = %process_id,
            checkpoint = %checkpoint_id,
            state = %instance.state,
            "process restored from checkpoint"
        );
        self.emit(
            DomainEvent::new(
                events::PROCESS_RESTORED,
                json!({
                    "processId": process_id,
                    "checkpointId": checkpoint_id,
                    "state": instance.state,
                }),
            )
            .with_correlation_id(process_id.to_string()),
        )
        .await;
        Ok(instance)
    }

    /// Checkpoints of one process, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_checkpoints(
        &self,
        process_id: ProcessId,
    ) -> Result<Vec<ProcessCheckpoint>, ProcessError> {
        self.store.list_checkpoints(process_id).await
    }

    // === Internals ===

    async fn lock_instance(&self, process_id: ProcessId) -> InstanceLock<'_> {
        let lock = Arc::clone(self.locks.lock().entry(process_id).or_default());
        InstanceLock {
            locks: &self.locks,
            process_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn load(&self, process_id: ProcessId) -> Result<ProcessInstance, ProcessError> {
        self.store
            .load_instance(process_id)
            .await?
            .ok_or(ProcessError::NotFound(process_id))
    }

    fn pinned_definition(&self, instance: &ProcessInstance) -> Result<ProcessDefinition, ProcessError> {
        self.definition(&instance.definition_id)
            .ok_or_else(|| ProcessError::DefinitionNotFound {
                process_type: instance.process_type.clone(),
                version: instance.version.clone(),
            })
    }

    async fn emit(&self, event: DomainEvent) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.bus.publish(event).await {
            warn!(event_type = %event_type, error = %e, "failed to publish process event");
        }
    }
}

fn to_params(instance: &ProcessInstance) -> Result<Value, ProcessError> {
    serde_json::to_value(instance).map_err(|e| ProcessError::InvalidParams(e.to_string()))
}

fn take_field(params: &mut Value, field: &str) -> Result<Value, ProcessError> {
    params
        .as_object_mut()
        .map(|obj| obj.remove(field).unwrap_or(Value::Null))
        .ok_or_else(|| ProcessError::InvalidParams(format!("hooks must return an object with '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_hook::testing::MockHook;
    use flux_hook::{Extension, HookError};

    fn engine_with(ext: Arc<ExtensionSystem>) -> ProcessEngine {
        let bus = Arc::new(EventBus::new(Arc::clone(&ext)));
        ProcessEngine::new(ext, bus)
    }

    fn engine() -> ProcessEngine {
        engine_with(Arc::new(ExtensionSystem::new()))
    }

    fn order() -> ProcessDefinition {
        ProcessDefinition::new("order-v1", "order", "draft")
            .transition("draft", "submit", "submitted")
            .transition("submitted", "approve", "approved")
    }

    #[test]
    fn duplicate_id_and_version_rejected() {
        let engine = engine();
        engine.register_definition(order()).expect("register");

        assert!(matches!(
            engine.register_definition(order()),
            Err(ProcessError::DuplicateDefinition(id)) if id == "order-v1"
        ));
        let same_version = ProcessDefinition::new("order-other", "order", "draft");
        assert!(matches!(
            engine.register_definition(same_version),
            Err(ProcessError::DuplicateVersion { .. })
        ));
        engine
            .register_definition(ProcessDefinition::new("order-v2", "order", "draft").with_version("2"))
            .expect("new version");
        assert_eq!(engine.definitions_for("order").len(), 2);
    }

    #[tokio::test]
    async fn equivalent_version_spellings_collide() {
        let engine = engine();
        engine
            .register_definition(order().with_version("1.0"))
            .expect("register");

        let err = engine
            .register_definition(
                ProcessDefinition::new("order-v1-again", "order", "draft").with_version("1"),
            )
            .expect_err("1 equals 1.0");
        assert!(matches!(err, ProcessError::DuplicateVersion { .. }));
        assert_eq!(engine.definitions_for("order").len(), 1);

        let p = engine
            .create_process("order", json!({}), CreateOptions::version("1.0.0"))
            .await
            .expect("pinned by numeric value");
        assert_eq!(p.definition_id, "order-v1");
    }

    #[tokio::test]
    async fn create_starts_in_initial_state() {
        let engine = engine();
        engine.register_definition(order()).expect("register");

        let p = engine
            .create_process("order", json!({"total": 5}), CreateOptions::default())
            .await
            .expect("create");
        assert_eq!(p.state, "draft");
        assert_eq!(p.data, json!({"total": 5}));
        assert_eq!(p.created_at, p.updated_at);
        assert_eq!(engine.get_process(p.id).await.expect("get"), p);
    }

    #[tokio::test]
    async fn unknown_type_is_not_found() {
        let engine = engine();
        let err = engine
            .create_process("ghost", json!(null), CreateOptions::default())
            .await
            .expect_err("no definition");
        assert!(matches!(err, ProcessError::DefinitionNotFound { .. }));
    }

    #[tokio::test]
    async fn before_create_hook_rewrites_data() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("defaults", "Defaults").with_hook(Arc::new(
            MockHook::modifier("defaults", ExtensionPoint::ProcessBeforeCreate, |p| {
                p["data"]["currency"] = json!("EUR");
            }),
        )))
        .expect("register");
        let engine = engine_with(ext);
        engine.register_definition(order()).expect("register");

        let p = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect("create");
        assert_eq!(p.data, json!({"currency": "EUR"}));
    }

    #[tokio::test]
    async fn after_create_rejection_stores_nothing() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("veto", "Veto").with_hook(Arc::new(
            MockHook::rejecter("veto", ExtensionPoint::ProcessAfterCreate, "quota"),
        )))
        .expect("register");
        let engine = engine_with(ext);
        engine.register_definition(order()).expect("register");

        let err = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect_err("rejected");
        assert!(matches!(err, ProcessError::Hook(HookError::Rejected { .. })));
        assert!(engine.list_processes().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn invalid_transition_leaves_state() {
        let engine = engine();
        engine.register_definition(order()).expect("register");
        let p = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect("create");

        let err = engine
            .apply_event(p.id, "approve", json!({}))
            .await
            .expect_err("not allowed from draft");
        assert!(matches!(err, ProcessError::InvalidTransition { ref state, .. } if state == "draft"));
        assert_eq!(engine.get_process(p.id).await.expect("get").state, "draft");
    }

    #[tokio::test]
    async fn payload_not_merged_into_data() {
        let engine = engine();
        engine.register_definition(order()).expect("register");
        let p = engine
            .create_process("order", json!({"a": 1}), CreateOptions::default())
            .await
            .expect("create");

        let after = engine
            .apply_event(p.id, "submit", json!({"b": 2}))
            .await
            .expect("submit");
        assert_eq!(after.state, "submitted");
        assert_eq!(after.data, json!({"a": 1}));
        assert!(after.updated_at >= p.updated_at);
    }

    #[tokio::test]
    async fn exit_then_entry_actions_transform_data() {
        let def = order()
            .on_exit("draft", |mut data: Value, _ctx: ActionContext| async move {
                data["trail"] = json!(["exit-draft"]);
                Ok::<_, String>(data)
            })
            .on_entry("submitted", |mut data: Value, ctx: ActionContext| async move {
                if let Some(trail) = data["trail"].as_array_mut() {
                    trail.push(json!(format!("enter-{}", ctx.to)));
                }
                data["by"] = ctx.payload["user"].clone();
                Ok::<_, String>(data)
            });
        let engine = engine();
        engine.register_definition(def).expect("register");
        let p = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect("create");

        let after = engine
            .apply_event(p.id, "submit", json!({"user": "kim"}))
            .await
            .expect("submit");
        assert_eq!(after.data["trail"], json!(["exit-draft", "enter-submitted"]));
        assert_eq!(after.data["by"], json!("kim"));
    }

    #[tokio::test]
    async fn failing_action_commits_nothing() {
        let def = order().on_entry("submitted", |_data: Value, _ctx: ActionContext| async move {
            Err::<Value, _>("inventory closed".to_string())
        });
        let engine = engine();
        engine.register_definition(def).expect("register");
        let p = engine
            .create_process("order", json!({"n": 1}), CreateOptions::default())
            .await
            .expect("create");

        let err = engine
            .apply_event(p.id, "submit", json!({}))
            .await
            .expect_err("action fails");
        assert!(matches!(err, ProcessError::ActionFailed { phase: "entry", .. }));
        let stored = engine.get_process(p.id).await.expect("get");
        assert_eq!(stored.state, "draft");
        assert_eq!(stored.data, json!({"n": 1}));
    }

    #[tokio::test]
    async fn available_events_follow_state() {
        let engine = engine();
        engine.register_definition(order()).expect("register");
        let p = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect("create");
        assert_eq!(engine.available_events(p.id).await.expect("events"), vec!["submit"]);
    }

    #[tokio::test]
    async fn unknown_process_not_found() {
        let engine = engine();
        let id = ProcessId::new();
        assert!(matches!(
            engine.apply_event(id, "go", json!(null)).await,
            Err(ProcessError::NotFound(found)) if found == id
        ));
        assert!(matches!(
            engine.save_checkpoint(id).await,
            Err(ProcessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lock_table_drains_after_each_operation() {
        let engine = engine();
        engine.register_definition(order()).expect("register");

        for _ in 0..100 {
            let id = ProcessId::new();
            assert!(engine.apply_event(id, "submit", json!({})).await.is_err());
            assert!(engine.save_checkpoint(id).await.is_err());
            assert!(engine
                .restore_from_checkpoint(id, CheckpointId::new())
                .await
                .is_err());
        }
        assert!(engine.locks.lock().is_empty());

        let p = engine
            .create_process("order", json!({}), CreateOptions::default())
            .await
            .expect("create");
        let cp = engine.save_checkpoint(p.id).await.expect("checkpoint");
        engine
            .apply_event(p.id, "submit", json!({}))
            .await
            .expect("submit");
        engine
            .restore_from_checkpoint(p.id, cp.id)
            .await
            .expect("restore");
        assert!(engine.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn instance_lock_survives_while_contended() {
        let engine = engine();
        let id = ProcessId::new();

        let first = engine.lock_instance(id).await;
        let second = engine.lock_instance(id);
        tokio::pin!(second);
        assert!(still_pending(second.as_mut()).await);
        assert_eq!(engine.locks.lock().len(), 1);

        drop(first);
        let second = second.await;
        assert_eq!(engine.locks.lock().len(), 1);
        drop(second);
        assert!(engine.locks.lock().is_empty());
    }

    /// `true` if `fut` does not complete before the task yields once.
    async fn still_pending<F: std::future::Future + Unpin>(fut: F) -> bool {
        tokio::select! {
            biased;
            _ = fut => false,
            () = tokio::task::yield_now() => true,
        }
    }
}
