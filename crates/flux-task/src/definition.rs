//! Task definitions and handlers.

use crate::{CancellationToken, RetryPolicy, TaskError, TaskFailure};
use async_trait::async_trait;
use flux_types::ExecutionId;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What a handler sees for one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The task being run.
    pub task_id: String,
    /// The execution this attempt belongs to.
    pub execution_id: ExecutionId,
    /// Input after `task:beforeExecution` hooks.
    pub input: Value,
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Shared by every attempt of the execution.
    pub cancellation_token: CancellationToken,
}

/// Result of one attempt.
pub type TaskResult = Result<Value, TaskFailure>;

/// Body of a task.
///
/// Handlers should check `ctx.cancellation_token` and return
/// [`TaskFailure::cancelled`] promptly once it fires.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Runs one attempt.
    async fn run(&self, ctx: TaskContext) -> TaskResult;
}

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn TaskHandler>;

/// Closure-backed handler.
///
/// # Example
///
/// ```
/// use flux_task::{FnTask, TaskContext, TaskDefinition, TaskFailure};
/// use serde_json::json;
///
/// let def = TaskDefinition::new(
///     "double",
///     FnTask::arc(|ctx: TaskContext| async move {
///         let n = ctx.input["n"].as_i64().ok_or_else(|| TaskFailure::new("InputError", "n missing"))?;
///         Ok(json!(n * 2))
///     }),
/// );
/// assert_eq!(def.name, "double");
/// ```
pub struct FnTask<F> {
    f: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    /// Wraps a closure as a shared handler.
    pub fn arc(f: F) -> HandlerRef {
        Arc::new(Self { f })
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnTask<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn run(&self, ctx: TaskContext) -> TaskResult {
        (self.f)(ctx).await
    }
}

/// A registered unit of work.
#[derive(Clone)]
pub struct TaskDefinition {
    /// Unique id.
    pub id: String,
    /// Display name. Defaults to the id.
    pub name: String,
    /// The task body.
    pub handler: HandlerRef,
    /// Retry settings. `None` means a single attempt.
    pub retry: Option<RetryPolicy>,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Tasks run first by `execute_task_with_dependencies` when the
    /// caller passes none.
    pub dependencies: Vec<String>,
}

impl TaskDefinition {
    /// Creates a definition with no retry, timeout, or dependencies.
    pub fn new(id: impl Into<String>, handler: HandlerRef) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            handler,
            retry: None,
            timeout: None,
            dependencies: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a default dependency.
    #[must_use]
    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }

    /// Checks the definition's own shape.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidDefinition`] for an empty id, a zero
    /// `max_attempts`, a zero timeout, or a self-dependency.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.id.trim().is_empty() {
            return Err(TaskError::invalid_definition(&self.id, "id must not be empty"));
        }
        if self.retry.as_ref().is_some_and(|r| r.max_attempts == 0) {
            return Err(TaskError::invalid_definition(
                &self.id,
                "maxAttempts must be at least 1",
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(TaskError::invalid_definition(&self.id, "timeout must be positive"));
        }
        if self.dependencies.iter().any(|d| *d == self.id) {
            return Err(TaskError::invalid_definition(&self.id, "task depends on itself"));
        }
        Ok(())
    }

    /// Attempts allowed for one execution.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry.as_ref().map_or(1, |r| r.max_attempts)
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> HandlerRef {
        FnTask::arc(|_ctx| async { Ok::<_, TaskFailure>(json!(null)) })
    }

    #[test]
    fn defaults() {
        let def = TaskDefinition::new("t", noop());
        assert_eq!(def.name, "t");
        assert_eq!(def.max_attempts(), 1);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let def = TaskDefinition::new("t", noop()).with_retry(RetryPolicy::new(0));
        assert!(matches!(
            def.validate(),
            Err(TaskError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn zero_timeout_and_self_dependency_rejected() {
        let timed = TaskDefinition::new("t", noop()).with_timeout(Duration::ZERO);
        let looped = TaskDefinition::new("t", noop()).depends_on("t");
        assert!(timed.validate().is_err());
        assert!(looped.validate().is_err());
    }

    #[tokio::test]
    async fn fn_task_runs_closure() {
        let handler = FnTask::arc(|ctx: TaskContext| async move {
            Ok::<_, TaskFailure>(json!({"attempt": ctx.attempt_number}))
        });
        let out = handler
            .run(TaskContext {
                task_id: "t".into(),
                execution_id: ExecutionId::new(),
                input: json!(null),
                attempt_number: 2,
                cancellation_token: CancellationToken::new(),
            })
            .await
            .expect("handler should succeed");
        assert_eq!(out, json!({"attempt": 2}));
    }
}
