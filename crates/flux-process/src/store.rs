//! Process storage abstraction.
//!
//! The [`ProcessStore`] trait holds instances and checkpoints. The
//! engine keeps definitions itself; they carry closures and are not
//! persisted.

use crate::{ProcessCheckpoint, ProcessError, ProcessInstance};
use async_trait::async_trait;
use flux_types::{CheckpointId, ProcessId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Instance and checkpoint storage.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    /// Inserts or overwrites an instance.
    async fn save_instance(&self, instance: &ProcessInstance) -> Result<(), ProcessError>;

    /// Loads an instance. `Ok(None)` if absent.
    async fn load_instance(&self, id: ProcessId) -> Result<Option<ProcessInstance>, ProcessError>;

    /// All instances, oldest first.
    async fn list_instances(&self) -> Result<Vec<ProcessInstance>, ProcessError>;

    /// Stores a checkpoint.
    async fn save_checkpoint(&self, checkpoint: &ProcessCheckpoint) -> Result<(), ProcessError>;

    /// Loads a checkpoint. `Ok(None)` if absent.
    async fn load_checkpoint(
        &self,
        id: CheckpointId,
    ) -> Result<Option<ProcessCheckpoint>, ProcessError>;

    /// Checkpoints of one process, oldest first.
    async fn list_checkpoints(
        &self,
        process_id: ProcessId,
    ) -> Result<Vec<ProcessCheckpoint>, ProcessError>;
}

#[derive(Default)]
struct Inner {
    instances: HashMap<ProcessId, ProcessInstance>,
    checkpoints: HashMap<CheckpointId, ProcessCheckpoint>,
    /// Checkpoint ids per process, in save order.
    by_process: HashMap<ProcessId, Vec<CheckpointId>>,
}

/// In-memory [`ProcessStore`].
#[derive(Default)]
pub struct InMemoryProcessStore {
    inner: RwLock<Inner>,
}

impl InMemoryProcessStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn save_instance(&self, instance: &ProcessInstance) -> Result<(), ProcessError> {
        self.inner
            .write()
            .instances
            .insert(instance.id, instance.clone());
        Ok(())
    }

    async fn load_instance(&self, id: ProcessId) -> Result<Option<ProcessInstance>, ProcessError> {
        Ok(self.inner.read().instances.get(&id).cloned())
    }

    async fn list_instances(&self) -> Result<Vec<ProcessInstance>, ProcessError> {
        let mut all: Vec<ProcessInstance> = self.inner.read().instances.values().cloned().collect();
        all.sort_by_key(|i| i.created_at);
        Ok(all)
    }

    async fn save_checkpoint(&self, checkpoint: &ProcessCheckpoint) -> Result<(), ProcessError> {
        let mut inner = self.inner.write();
        inner
            .by_process
            .entry(checkpoint.process_id)
            .or_default()
            .push(checkpoint.id);
        inner.checkpoints.insert(checkpoint.id, checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(
        &self,
        id: CheckpointId,
    ) -> Result<Option<ProcessCheckpoint>, ProcessError> {
        Ok(self.inner.read().checkpoints.get(&id).cloned())
    }

    async fn list_checkpoints(
        &self,
        process_id: ProcessId,
    ) -> Result<Vec<ProcessCheckpoint>, ProcessError> {
        let inner = self.inner.read();
        Ok(inner
            .by_process
            .get(&process_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.checkpoints.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn instance(state: &str) -> ProcessInstance {
        let now = Utc::now();
        ProcessInstance {
            id: ProcessId::new(),
            process_type: "order".into(),
            definition_id: "order-v1".into(),
            state: state.into(),
            data: json!({}),
            created_at: now,
            updated_at: now,
            version: None,
            recovery: None,
        }
    }

    #[tokio::test]
    async fn instance_save_overwrites() {
        let store = InMemoryProcessStore::new();
        let mut p = instance("a");
        store.save_instance(&p).await.expect("save");
        p.state = "b".into();
        store.save_instance(&p).await.expect("save");

        let loaded = store.load_instance(p.id).await.expect("load");
        assert_eq!(loaded.map(|i| i.state), Some("b".to_string()));
        assert_eq!(store.list_instances().await.expect("list").len(), 1);
        assert!(store
            .load_instance(ProcessId::new())
            .await
            .expect("load")
            .is_none());
    }

    #[tokio::test]
    async fn checkpoints_listed_per_process_in_order() {
        let store = InMemoryProcessStore::new();
        let p = instance("a");
        let other = instance("x");

        let first = ProcessCheckpoint::of(&p);
        let second = ProcessCheckpoint::of(&p);
        store.save_checkpoint(&first).await.expect("save");
        store
            .save_checkpoint(&ProcessCheckpoint::of(&other))
            .await
            .expect("save");
        store.save_checkpoint(&second).await.expect("save");

        let listed = store.list_checkpoints(p.id).await.expect("list");
        assert_eq!(listed, vec![first.clone(), second]);
        assert_eq!(
            store.load_checkpoint(first.id).await.expect("load"),
            Some(first)
        );
    }
}
