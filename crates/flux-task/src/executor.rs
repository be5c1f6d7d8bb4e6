//! TaskExecutor: registration, attempt loop, dependencies.
//!
//! # Attempt Loop
//!
//! ```text
//! execute_task(id, input)
//!     │
//!     ▼ task:beforeExecution        (may rewrite input or reject)
//!     ▼ attempt n ──► handler (raced against timeout)
//!     │     ├── Ok(result)           → task:afterExecution → task:completed
//!     │     ├── timeout              → cancel token → task:error → TaskTimeout
//!     │     ├── cancelled            → task:cancelled → Ok(status: cancelled)
//!     │     └── Err(failure)
//!     │           ├── retryable, n < max → sleep(delay(n)) → task:retryAttempt → attempt n+1
//!     │           └── otherwise          → task:error → task:failed → Failed
//!     ▼
//! ```
//!
//! The token is created once per `execute_task` call and shared by
//! every attempt. Cancelling it during a backoff sleep ends the
//! execution without another attempt.

use crate::{
    events, CancellationToken, MetricsSnapshot, TaskContext, TaskDefinition, TaskError,
    TaskExecution, TaskFailure, TaskMetrics, TaskStatus,
};
use flux_event::{DomainEvent, EventBus};
use flux_hook::{ExtensionPoint, ExtensionSystem};
use flux_types::ExecutionId;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How the attempt loop ended.
enum Ended {
    Completed(Value),
    Failed(TaskFailure),
    TimedOut(Duration),
    Cancelled,
}

struct InFlight {
    execution: TaskExecution,
    token: CancellationToken,
}

/// Keeps one execution in the in-flight table.
///
/// Dropping it removes the entry. If the caller's future was dropped
/// before the execution settled, the token is cancelled and the
/// execution is counted as cancelled so `running()` stays accurate.
struct Tracked<'a> {
    in_flight: &'a Mutex<HashMap<ExecutionId, InFlight>>,
    metrics: &'a TaskMetrics,
    execution_id: ExecutionId,
    settled: bool,
}

impl Tracked<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        let entry = self.in_flight.lock().remove(&self.execution_id);
        if self.settled {
            return;
        }
        if let Some(entry) = entry {
            entry.token.cancel();
        }
        self.metrics.record_cancelled();
        warn!(execution = %self.execution_id, "task execution abandoned before it settled");
    }
}

/// Runs registered tasks.
///
/// The task table and the in-flight table are `parking_lot` locks that
/// are never held across `.await`; executions of different tasks (and of
/// the same task) proceed concurrently.
pub struct TaskExecutor {
    extensions: Arc<ExtensionSystem>,
    bus: Arc<EventBus>,
    tasks: RwLock<HashMap<String, TaskDefinition>>,
    in_flight: Mutex<HashMap<ExecutionId, InFlight>>,
    metrics: TaskMetrics,
}

impl TaskExecutor {
    /// Creates an executor with no tasks.
    #[must_use]
    pub fn new(extensions: Arc<ExtensionSystem>, bus: Arc<EventBus>) -> Self {
        Self {
            extensions,
            bus,
            tasks: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            metrics: TaskMetrics::default(),
        }
    }

    // === Registration ===

    /// Registers a task.
    ///
    /// # Errors
    ///
    /// - [`TaskError::InvalidDefinition`] if validation fails
    /// - [`TaskError::DuplicateTask`] if the id is taken
    pub fn register_task(&self, definition: TaskDefinition) -> Result<(), TaskError> {
        definition.validate()?;
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&definition.id) {
            return Err(TaskError::DuplicateTask(definition.id));
        }
        debug!(
            task = %definition.id,
            max_attempts = definition.max_attempts(),
            timeout = ?definition.timeout,
            "task registered"
        );
        tasks.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Returns `true` if a task with this id is registered.
    #[must_use]
    pub fn has_task(&self, task_id: &str) -> bool {
        self.tasks.read().contains_key(task_id)
    }

    /// Registered task ids, sorted.
    #[must_use]
    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // === Execution ===

    /// Runs a task to completion, retrying per its policy.
    ///
    /// Returns the execution record with status `completed` or
    /// `cancelled`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task is not registered
    /// - [`TaskError::Failed`] once no retry remains
    /// - [`TaskError::Timeout`] if an attempt exceeds the timeout
    /// - [`TaskError::Hook`] if `task:beforeExecution` or
    ///   `task:afterExecution` rejects
    pub async fn execute_task(&self, task_id: &str, input: Value) -> Result<TaskExecution, TaskError> {
        let definition = self.task(task_id)?;
        let execution_id = ExecutionId::new();

        let params = json!({
            "taskId": task_id,
            "executionId": execution_id,
            "input": input,
        });
        let mut params = self
            .extensions
            .execute_extension_point(ExtensionPoint::TaskBeforeExecution, params)
            .await?;
        let input = take_field(&mut params, "input")?;

        let token = CancellationToken::new();
        let mut execution = TaskExecution::pending(execution_id, task_id);
        let tracked = self.start_tracking(&execution, &token);
        debug!(task = %task_id, execution = %execution_id, "task execution started");

        let started = Instant::now();
        let ended = self
            .run_attempts(&definition, &mut execution, input, &token)
            .await;
        tracked.settle();

        match ended {
            Ended::Completed(result) => {
                self.complete(execution, result, started.elapsed()).await
            }
            Ended::Cancelled => {
                execution.finish(TaskStatus::Cancelled);
                execution.error = Some(TaskFailure::cancelled());
                self.metrics.record_cancelled();
                info!(
                    task = %task_id,
                    execution = %execution_id,
                    attempt = execution.attempt_number,
                    "task cancelled"
                );
                self.emit(execution_event(events::TASK_CANCELLED, &execution, json!({})))
                    .await;
                Ok(execution)
            }
            Ended::Failed(failure) => {
                execution.finish(TaskStatus::Failed);
                execution.error = Some(failure.clone());
                self.metrics.record_failed();
                self.fail(&execution, &failure).await;
                Err(TaskError::Failed {
                    task_id: task_id.to_string(),
                    attempts: execution.attempt_number,
                    failure,
                })
            }
            Ended::TimedOut(timeout) => {
                let failure = TaskFailure::new(
                    crate::TIMEOUT_ERROR_TYPE,
                    format!("attempt exceeded {}ms", timeout.as_millis()),
                );
                execution.finish(TaskStatus::Failed);
                execution.error = Some(failure.clone());
                self.metrics.record_timed_out();
                self.fail(&execution, &failure).await;
                Err(TaskError::Timeout {
                    task_id: task_id.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Runs `dependencies` in order, then the task itself.
    ///
    /// Every dependency receives `input` unchanged. Their results are
    /// placed under `previousResults.<dependencyId>` in the task's input;
    /// a non-object input is wrapped as `{input, previousResults}`. An
    /// empty `dependencies` falls back to the definition's own list.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task is not registered
    /// - [`TaskError::DependencyFailed`] for the first dependency that
    ///   fails or is cancelled; later dependencies and the task do not run
    /// - any error of the task's own execution
    pub async fn execute_task_with_dependencies(
        &self,
        task_id: &str,
        input: Value,
        dependencies: &[String],
    ) -> Result<TaskExecution, TaskError> {
        let definition = self.task(task_id)?;
        let dependencies = if dependencies.is_empty() {
            definition.dependencies.as_slice()
        } else {
            dependencies
        };

        let mut previous = Map::new();
        for dependency in dependencies {
            let wrap = |source: TaskError| TaskError::DependencyFailed {
                task_id: task_id.to_string(),
                dependency: dependency.clone(),
                source: Box::new(source),
            };
            let execution = self
                .execute_task(dependency, input.clone())
                .await
                .map_err(wrap)?;
            if execution.status == TaskStatus::Cancelled {
                return Err(wrap(TaskError::Cancelled {
                    task_id: dependency.clone(),
                }));
            }
            previous.insert(
                dependency.clone(),
                execution.result.unwrap_or(Value::Null),
            );
        }

        let input = match input {
            Value::Object(mut obj) => {
                obj.insert("previousResults".to_string(), Value::Object(previous));
                Value::Object(obj)
            }
            other => json!({ "input": other, "previousResults": previous }),
        };
        self.execute_task(task_id, input).await
    }

    // === In-flight ===

    /// Snapshot of a running execution.
    #[must_use]
    pub fn execution(&self, execution_id: ExecutionId) -> Option<TaskExecution> {
        self.in_flight
            .lock()
            .get(&execution_id)
            .map(|entry| entry.execution.clone())
    }

    /// Every running execution, oldest first.
    #[must_use]
    pub fn in_flight(&self) -> Vec<TaskExecution> {
        let mut out: Vec<TaskExecution> = self
            .in_flight
            .lock()
            .values()
            .map(|entry| entry.execution.clone())
            .collect();
        out.sort_by_key(|e| e.started_at);
        out
    }

    /// Cancels a running execution.
    ///
    /// # Errors
    ///
    /// [`TaskError::ExecutionNotFound`] if it is not running.
    pub fn cancel_execution(&self, execution_id: ExecutionId) -> Result<(), TaskError> {
        let token = self
            .in_flight
            .lock()
            .get(&execution_id)
            .map(|entry| entry.token.clone())
            .ok_or(TaskError::ExecutionNotFound(execution_id))?;
        debug!(execution = %execution_id, "cancellation requested");
        token.cancel();
        Ok(())
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // === Internals ===

    fn task(&self, task_id: &str) -> Result<TaskDefinition, TaskError> {
        self.tasks
            .read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    fn start_tracking(&self, execution: &TaskExecution, token: &CancellationToken) -> Tracked<'_> {
        self.in_flight.lock().insert(
            execution.id,
            InFlight {
                execution: execution.clone(),
                token: token.clone(),
            },
        );
        self.metrics.record_started();
        Tracked {
            in_flight: &self.in_flight,
            metrics: &self.metrics,
            execution_id: execution.id,
            settled: false,
        }
    }

    fn track(&self, execution: &TaskExecution) {
        if let Some(entry) = self.in_flight.lock().get_mut(&execution.id) {
            entry.execution = execution.clone();
        }
    }

    async fn run_attempts(
        &self,
        definition: &TaskDefinition,
        execution: &mut TaskExecution,
        input: Value,
        token: &CancellationToken,
    ) -> Ended {
        execution.status = TaskStatus::Running;
        let mut attempt = 1;
        loop {
            execution.attempt_number = attempt;
            self.track(execution);
            if token.is_cancellation_requested() {
                return Ended::Cancelled;
            }

            let ctx = TaskContext {
                task_id: definition.id.clone(),
                execution_id: execution.id,
                input: input.clone(),
                attempt_number: attempt,
                cancellation_token: token.clone(),
            };
            let result = match definition.timeout {
                Some(limit) => match tokio::time::timeout(limit, definition.handler.run(ctx)).await {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        token.cancel();
                        warn!(
                            task = %definition.id,
                            execution = %execution.id,
                            attempt,
                            timeout_ms = limit.as_millis() as u64,
                            "task attempt timed out"
                        );
                        return Ended::TimedOut(limit);
                    }
                },
                None => definition.handler.run(ctx).await,
            };

            let failure = match result {
                Ok(value) => return Ended::Completed(value),
                Err(failure) => failure,
            };
            if failure.is_cancellation() || token.is_cancellation_requested() {
                return Ended::Cancelled;
            }

            let Some(policy) = definition
                .retry
                .as_ref()
                .filter(|p| attempt < p.max_attempts && p.is_retryable(&failure))
            else {
                return Ended::Failed(failure);
            };

            let delay = policy.delay(attempt);
            warn!(
                task = %definition.id,
                execution = %execution.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "task attempt failed, retrying"
            );
            tokio::select! {
                () = token.cancelled() => return Ended::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
            self.metrics.record_retry();
            self.emit(
                DomainEvent::new(
                    events::TASK_RETRY_ATTEMPT,
                    json!({
                        "taskId": definition.id,
                        "executionId": execution.id,
                        "attemptNumber": attempt,
                        "delayMs": delay.as_millis() as u64,
                        "error": failure,
                    }),
                )
                .with_correlation_id(execution.id.to_string()),
            )
            .await;
        }
    }

    async fn complete(
        &self,
        mut execution: TaskExecution,
        result: Value,
        elapsed: Duration,
    ) -> Result<TaskExecution, TaskError> {
        let params = json!({
            "taskId": execution.task_id,
            "executionId": execution.id,
            "result": result,
            "attemptNumber": execution.attempt_number,
            "durationMs": elapsed.as_millis() as u64,
        });
        let mut params = match self
            .extensions
            .execute_extension_point(ExtensionPoint::TaskAfterExecution, params)
            .await
        {
            Ok(params) => params,
            Err(e) => {
                self.metrics.record_failed();
                return Err(e.into());
            }
        };
        let result = take_field(&mut params, "result")?;

        execution.result = Some(result.clone());
        execution.finish(TaskStatus::Completed);
        self.metrics.record_completed();
        info!(
            task = %execution.task_id,
            execution = %execution.id,
            attempts = execution.attempt_number,
            duration_ms = elapsed.as_millis() as u64,
            "task completed"
        );
        self.emit(execution_event(
            events::TASK_COMPLETED,
            &execution,
            json!({ "result": result }),
        ))
        .await;
        Ok(execution)
    }

    /// Runs `task:error` and publishes `task:failed`. A failing
    /// `task:error` hook is logged; the task's own failure wins.
    async fn fail(&self, execution: &TaskExecution, failure: &TaskFailure) {
        warn!(
            task = %execution.task_id,
            execution = %execution.id,
            attempts = execution.attempt_number,
            error = %failure,
            "task failed"
        );
        let params = json!({
            "taskId": execution.task_id,
            "executionId": execution.id,
            "attemptNumber": execution.attempt_number,
            "error": failure,
        });
        if let Err(e) = self
            .extensions
            .execute_extension_point(ExtensionPoint::TaskError, params)
            .await
        {
            warn!(task = %execution.task_id, error = %e, "task:error hook failed");
        }
        self.emit(execution_event(
            events::TASK_FAILED,
            execution,
            json!({ "error": failure }),
        ))
        .await;
    }

    async fn emit(&self, event: DomainEvent) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.bus.publish(event).await {
            warn!(event_type = %event_type, error = %e, "failed to publish task event");
        }
    }
}

/// Builds a task event carrying `{taskId, executionId, attemptNumber}`
/// plus `extra`, correlated by execution id.
fn execution_event(event_type: &str, execution: &TaskExecution, extra: Value) -> DomainEvent {
    let mut payload = json!({
        "taskId": execution.task_id,
        "executionId": execution.id,
        "attemptNumber": execution.attempt_number,
    });
    if let (Some(obj), Value::Object(extra)) = (payload.as_object_mut(), extra) {
        obj.extend(extra);
    }
    DomainEvent::new(event_type, payload).with_correlation_id(execution.id.to_string())
}

fn take_field(params: &mut Value, field: &str) -> Result<Value, TaskError> {
    params
        .as_object_mut()
        .map(|obj| obj.remove(field).unwrap_or(Value::Null))
        .ok_or_else(|| TaskError::InvalidParams(format!("hooks must return an object with '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnTask, RetryPolicy};
    use flux_hook::testing::MockHook;
    use flux_hook::Extension;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor_with(ext: Arc<ExtensionSystem>) -> TaskExecutor {
        let bus = Arc::new(EventBus::new(Arc::clone(&ext)));
        TaskExecutor::new(ext, bus)
    }

    fn executor() -> TaskExecutor {
        executor_with(Arc::new(ExtensionSystem::new()))
    }

    fn echo(id: &str) -> TaskDefinition {
        TaskDefinition::new(
            id,
            FnTask::arc(|ctx: TaskContext| async move { Ok::<_, TaskFailure>(ctx.input) }),
        )
    }

    #[test]
    fn duplicate_and_zero_attempts_rejected() {
        let exec = executor();
        exec.register_task(echo("a")).expect("register");
        assert!(matches!(
            exec.register_task(echo("a")),
            Err(TaskError::DuplicateTask(id)) if id == "a"
        ));
        assert!(matches!(
            exec.register_task(echo("b").with_retry(RetryPolicy::new(0))),
            Err(TaskError::InvalidDefinition { .. })
        ));
        assert_eq!(exec.task_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn unknown_task_not_found() {
        let exec = executor();
        assert!(matches!(
            exec.execute_task("ghost", json!(null)).await,
            Err(TaskError::NotFound(id)) if id == "ghost"
        ));
    }

    #[tokio::test]
    async fn success_returns_completed_execution() {
        let exec = executor();
        exec.register_task(echo("echo")).expect("register");

        let done = exec.execute_task("echo", json!({"x": 1})).await.expect("run");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.attempt_number, 1);
        assert_eq!(done.result, Some(json!({"x": 1})));
        assert!(done.ended_at.is_some());
        assert!(exec.in_flight().is_empty());

        let m = exec.metrics();
        assert_eq!((m.started, m.completed, m.running()), (1, 1, 0));
    }

    #[tokio::test]
    async fn no_policy_fails_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let exec = executor();
        exec.register_task(TaskDefinition::new(
            "flaky",
            FnTask::arc(move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<Value, _>(TaskFailure::new("IoError", "disk")) }
            }),
        ))
        .expect("register");

        let err = exec.execute_task("flaky", json!(null)).await.expect_err("fails");
        assert!(matches!(err, TaskError::Failed { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exec.metrics().failed, 1);
    }

    #[tokio::test]
    async fn before_execution_hook_rewrites_input() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("inject", "Inject").with_hook(Arc::new(
            MockHook::modifier("inject", ExtensionPoint::TaskBeforeExecution, |p| {
                p["input"]["tenant"] = json!("acme");
            }),
        )))
        .expect("register");
        let exec = executor_with(ext);
        exec.register_task(echo("echo")).expect("register");

        let done = exec.execute_task("echo", json!({})).await.expect("run");
        assert_eq!(done.result, Some(json!({"tenant": "acme"})));
    }

    #[tokio::test]
    async fn after_execution_hook_rewrites_result() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("wrap", "Wrap").with_hook(Arc::new(
            MockHook::modifier("wrap", ExtensionPoint::TaskAfterExecution, |p| {
                let took = p["durationMs"].is_u64();
                p["result"] = json!({"wrapped": p["result"].clone(), "timed": took});
            }),
        )))
        .expect("register");
        let exec = executor_with(ext);
        exec.register_task(echo("echo")).expect("register");

        let done = exec.execute_task("echo", json!(7)).await.expect("run");
        assert_eq!(done.result, Some(json!({"wrapped": 7, "timed": true})));
    }

    #[tokio::test]
    async fn before_execution_rejection_runs_nothing() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("gate", "Gate").with_hook(Arc::new(
            MockHook::rejecter("gate", ExtensionPoint::TaskBeforeExecution, "closed"),
        )))
        .expect("register");
        let exec = executor_with(ext);
        exec.register_task(echo("echo")).expect("register");

        assert!(matches!(
            exec.execute_task("echo", json!(null)).await,
            Err(TaskError::Hook(_))
        ));
        assert_eq!(exec.metrics().started, 0);
    }

    #[tokio::test]
    async fn error_hook_failure_does_not_mask_task_failure() {
        let ext = Arc::new(ExtensionSystem::new());
        ext.register_extension(Extension::new("broken", "Broken").with_hook(Arc::new(
            MockHook::rejecter("broken", ExtensionPoint::TaskError, "boom"),
        )))
        .expect("register");
        let exec = executor_with(ext);
        exec.register_task(TaskDefinition::new(
            "bad",
            FnTask::arc(|_ctx| async { Err::<Value, _>(TaskFailure::new("Oops", "x")) }),
        ))
        .expect("register");

        let err = exec.execute_task("bad", json!(null)).await.expect_err("fails");
        assert!(matches!(err, TaskError::Failed { ref failure, .. } if failure.error_type == "Oops"));
    }

    #[test]
    fn cancel_unknown_execution_not_found() {
        let exec = executor();
        let id = ExecutionId::new();
        assert!(matches!(
            exec.cancel_execution(id),
            Err(TaskError::ExecutionNotFound(found)) if found == id
        ));
        assert!(exec.execution(id).is_none());
    }

    #[tokio::test]
    async fn dropped_execution_leaves_no_trace() {
        let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let exec = executor();
        exec.register_task(TaskDefinition::new(
            "hang",
            FnTask::arc(move |ctx: TaskContext| {
                *slot.lock() = Some(ctx.cancellation_token.clone());
                std::future::pending::<Result<Value, TaskFailure>>()
            }),
        ))
        .expect("register");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            exec.execute_task("hang", json!({})),
        )
        .await;
        assert!(abandoned.is_err());

        assert!(exec.in_flight().is_empty());
        let m = exec.metrics();
        assert_eq!((m.started, m.cancelled, m.running()), (1, 1, 0));
        let token = seen.lock().clone().expect("handler ran");
        assert!(token.is_cancellation_requested());
    }
}
