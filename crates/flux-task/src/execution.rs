//! Execution records.

use crate::TaskFailure;
use chrono::{DateTime, Utc};
use flux_types::ExecutionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an execution is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, no attempt made yet.
    Pending,
    /// An attempt or backoff is in progress.
    Running,
    /// An attempt succeeded.
    Completed,
    /// Attempts exhausted or a non-retryable failure.
    Failed,
    /// Cancelled before completing.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for completed, failed, and cancelled.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One call to `execute_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_id: String,
    pub status: TaskStatus,
    /// 1-based number of the current or last attempt; 0 before the first.
    pub attempt_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskExecution {
    pub(crate) fn pending(id: ExecutionId, task_id: &str) -> Self {
        Self {
            id,
            task_id: task_id.to_string(),
            status: TaskStatus::Pending,
            attempt_number: 0,
            result: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub(crate) fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Wall time from start to end, if ended.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}
