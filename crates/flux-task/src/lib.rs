//! Task executor for the Flux runtime.
//!
//! # Overview
//!
//! A [`TaskDefinition`] pairs an id with an async [`TaskHandler`] and
//! optional [`RetryPolicy`], timeout, and default dependencies. The
//! [`TaskExecutor`] runs definitions as [`TaskExecution`]s:
//!
//! - failures are retried while attempts remain and the failure type is
//!   retryable, sleeping a [`BackoffStrategy`] delay between attempts
//! - a [`CancellationToken`] shared by every attempt ends the execution
//!   as `cancelled`, even mid-backoff
//! - a timeout cancels the token and surfaces [`TaskError::Timeout`]
//!   without retrying
//!
//! # Extension Points
//!
//! | Point | Params | Effect |
//! |-------|--------|--------|
//! | `task:beforeExecution` | `{taskId, executionId, input}` | may rewrite `input` or reject |
//! | `task:afterExecution` | `{taskId, executionId, result, attemptNumber, durationMs}` | may rewrite `result` or reject |
//! | `task:error` | `{taskId, executionId, attemptNumber, error}` | notification; failures are logged |
//!
//! # Domain Events
//!
//! [`events::TASK_COMPLETED`], [`events::TASK_FAILED`],
//! [`events::TASK_CANCELLED`], and [`events::TASK_RETRY_ATTEMPT`] are
//! published with `metadata.correlationId` set to the execution id.

mod cancel;
mod definition;
mod error;
mod execution;
mod executor;
mod metrics;
mod retry;

pub use cancel::CancellationToken;
pub use definition::{FnTask, HandlerRef, TaskContext, TaskDefinition, TaskHandler, TaskResult};
pub use error::{TaskError, TaskFailure, CANCELLED_ERROR_TYPE, TIMEOUT_ERROR_TYPE};
pub use execution::{TaskExecution, TaskStatus};
pub use executor::TaskExecutor;
pub use metrics::{MetricsSnapshot, TaskMetrics};
pub use retry::{BackoffStrategy, RetryPolicy};

/// Domain event types published by the executor.
pub mod events {
    /// An execution completed.
    pub const TASK_COMPLETED: &str = "task:completed";
    /// An execution failed permanently or timed out.
    pub const TASK_FAILED: &str = "task:failed";
    /// An execution was cancelled.
    pub const TASK_CANCELLED: &str = "task:cancelled";
    /// A retry is about to start; carries the new `attemptNumber`.
    pub const TASK_RETRY_ATTEMPT: &str = "task:retryAttempt";
}
