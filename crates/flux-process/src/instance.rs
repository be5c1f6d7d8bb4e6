//! Process instances and checkpoints.

use chrono::{DateTime, Utc};
use flux_types::{CheckpointId, ProcessId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A running process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    /// Instance id.
    pub id: ProcessId,
    /// Process type (definition name).
    #[serde(rename = "type")]
    pub process_type: String,
    /// Id of the definition this instance is pinned to.
    pub definition_id: String,
    /// Current state.
    pub state: String,
    /// Instance data.
    pub data: Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state or data change.
    pub updated_at: DateTime<Utc>,
    /// Version of the pinned definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Set once the instance has been restored from a checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryInfo>,
}

/// Where a restored instance came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    /// Checkpoint restored from.
    pub checkpoint_id: CheckpointId,
    /// When that checkpoint was taken.
    pub last_saved_at: DateTime<Utc>,
}

/// Immutable snapshot of an instance's state and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCheckpoint {
    /// Checkpoint id.
    pub id: CheckpointId,
    /// The process snapshotted.
    pub process_id: ProcessId,
    /// State at snapshot time.
    pub state: String,
    /// Data at snapshot time.
    pub data: Value,
    /// Snapshot time.
    pub created_at: DateTime<Utc>,
}

impl ProcessCheckpoint {
    /// Snapshots `instance` now.
    #[must_use]
    pub fn of(instance: &ProcessInstance) -> Self {
        Self {
            id: CheckpointId::new(),
            process_id: instance.id,
            state: instance.state.clone(),
            data: instance.data.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Options for `create_process`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Pin a definition version instead of taking the highest.
    pub version: Option<String>,
}

impl CreateOptions {
    /// Pins `version`.
    #[must_use]
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
        }
    }
}
