//! Process definitions: states, transitions, guards, and actions.

use crate::ProcessError;
use async_trait::async_trait;
use flux_types::ProcessId;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Transition guard, called with the instance data and the event payload.
///
/// A guard returning `false` makes the transition invisible to that
/// event, exactly as if it were not declared.
pub type Guard = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Entry or exit action. Receives the current data and returns the
/// data to carry forward.
///
/// Actions run while the instance lock is held, so other events on the
/// same process wait for them; other processes are unaffected.
#[async_trait]
pub trait StateAction: Send + Sync {
    /// Transforms `data`. An `Err` aborts the transition.
    async fn run(&self, data: Value, ctx: &ActionContext) -> Result<Value, String>;
}

/// Shared handle to an action.
pub type ActionRef = Arc<dyn StateAction>;

/// Closure-backed action. The closure receives an owned clone of the
/// context so the returned future can outlive the borrow.
///
/// # Example
///
/// ```
/// use flux_process::{ActionContext, ProcessDefinition};
/// use serde_json::{json, Value};
///
/// let def = ProcessDefinition::new("order-v1", "order", "draft")
///     .transition("draft", "submit", "submitted")
///     .on_entry("submitted", |mut data: Value, ctx: ActionContext| async move {
///         data["submittedBy"] = ctx.payload["user"].clone();
///         Ok(data)
///     });
/// assert!(def.entry_actions.contains_key("submitted"));
/// ```
pub struct FnAction<F> {
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    /// Wraps a closure as a shared action.
    pub fn arc(f: F) -> ActionRef {
        Arc::new(Self { f })
    }
}

#[async_trait]
impl<F, Fut> StateAction for FnAction<F>
where
    F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    async fn run(&self, data: Value, ctx: &ActionContext) -> Result<Value, String> {
        (self.f)(data, ctx.clone()).await
    }
}

/// What an entry or exit action sees about the transition in progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    /// The process being transitioned.
    pub process_id: ProcessId,
    /// State being left.
    pub from: String,
    /// State being entered.
    pub to: String,
    /// Triggering event type.
    pub event: String,
    /// Event payload after `process:beforeTransition` hooks.
    pub payload: Value,
}

/// One edge of the state machine.
#[derive(Clone)]
pub struct Transition {
    /// Source state.
    pub from: String,
    /// Target state.
    pub to: String,
    /// Event type that triggers it.
    pub on: String,
    /// Optional guard.
    pub guard: Option<Guard>,
}

impl Transition {
    /// Creates an unguarded transition.
    pub fn new(from: impl Into<String>, on: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            on: on.into(),
            guard: None,
        }
    }

    /// Attaches a guard.
    #[must_use]
    pub fn with_guard(
        mut self,
        guard: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    fn allows(&self, data: &Value, payload: &Value) -> bool {
        self.guard.as_ref().map_or(true, |g| g(data, payload))
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("on", &self.on)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

/// A state-machine definition.
///
/// Processes are created by `name` (the process type). Several
/// definitions may share a name as long as their versions differ.
///
/// # Example
///
/// ```
/// use flux_process::ProcessDefinition;
///
/// let def = ProcessDefinition::new("order-v1", "order", "draft")
///     .with_version("1.0")
///     .transition("draft", "submit", "submitted")
///     .transition("submitted", "approve", "approved");
/// assert!(def.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct ProcessDefinition {
    /// Unique id.
    pub id: String,
    /// Process type name.
    pub name: String,
    /// State new instances start in.
    pub initial_state: String,
    /// Transitions, in declaration order.
    pub transitions: Vec<Transition>,
    /// Actions run when entering a state.
    pub entry_actions: HashMap<String, ActionRef>,
    /// Actions run when leaving a state.
    pub exit_actions: HashMap<String, ActionRef>,
    /// Dot-separated version, e.g. `1.2.0`.
    pub version: Option<String>,
}

impl ProcessDefinition {
    /// Creates a definition with no transitions.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        initial_state: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            initial_state: initial_state.into(),
            transitions: Vec::new(),
            entry_actions: HashMap::new(),
            exit_actions: HashMap::new(),
            version: None,
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds an unguarded transition.
    #[must_use]
    pub fn transition(
        self,
        from: impl Into<String>,
        on: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.with_transition(Transition::new(from, on, to))
    }

    /// Adds a transition.
    #[must_use]
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Sets the entry action for `state` from an async closure.
    #[must_use]
    pub fn on_entry<F, Fut>(self, state: impl Into<String>, action: F) -> Self
    where
        F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.with_entry_action(state, FnAction::arc(action))
    }

    /// Sets the exit action for `state` from an async closure.
    #[must_use]
    pub fn on_exit<F, Fut>(self, state: impl Into<String>, action: F) -> Self
    where
        F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.with_exit_action(state, FnAction::arc(action))
    }

    /// Sets the entry action for `state`.
    #[must_use]
    pub fn with_entry_action(mut self, state: impl Into<String>, action: ActionRef) -> Self {
        self.entry_actions.insert(state.into(), action);
        self
    }

    /// Sets the exit action for `state`.
    #[must_use]
    pub fn with_exit_action(mut self, state: impl Into<String>, action: ActionRef) -> Self {
        self.exit_actions.insert(state.into(), action);
        self
    }

    /// Checks the definition's own shape.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidDefinition`] when the id, name, or initial
    /// state is empty, a transition has an empty field, or transitions
    /// exist but none mentions the initial state.
    pub fn validate(&self) -> Result<(), ProcessError> {
        let invalid = |reason: &str| Err(ProcessError::invalid_definition(&self.id, reason));

        if self.id.trim().is_empty() {
            return invalid("id must not be empty");
        }
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.initial_state.trim().is_empty() {
            return invalid("initial state must not be empty");
        }
        if self
            .transitions
            .iter()
            .any(|t| t.from.is_empty() || t.to.is_empty() || t.on.is_empty())
        {
            return invalid("transitions need non-empty from, to, and on");
        }
        if !self.transitions.is_empty()
            && !self
                .transitions
                .iter()
                .any(|t| t.from == self.initial_state || t.to == self.initial_state)
        {
            return invalid("initial state is not part of any transition");
        }
        Ok(())
    }

    /// First transition out of `state` on `event` whose guard passes.
    #[must_use]
    pub fn find_transition(
        &self,
        state: &str,
        event: &str,
        data: &Value,
        payload: &Value,
    ) -> Option<&Transition> {
        self.transitions
            .iter()
            .filter(|t| t.from == state && t.on == event)
            .find(|t| t.allows(data, payload))
    }

    /// Event types with at least one transition out of `state`, in
    /// declaration order. Guards are not evaluated.
    #[must_use]
    pub fn events_from(&self, state: &str) -> Vec<String> {
        let mut events: Vec<String> = Vec::new();
        for t in self.transitions.iter().filter(|t| t.from == state) {
            if !events.contains(&t.on) {
                events.push(t.on.clone());
            }
        }
        events
    }

    /// Display form of the version.
    pub(crate) fn version_label(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| "unversioned".to_string())
    }
}

impl std::fmt::Debug for ProcessDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("version", &self.version)
            .field("transitions", &self.transitions)
            .field("entry_actions", &self.entry_actions.keys().collect::<Vec<_>>())
            .field("exit_actions", &self.exit_actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Compares two versions component-wise.
///
/// Components are split on `.` and compared numerically when both
/// parse as integers, lexically otherwise. Missing components count as
/// zero, so `1.0` equals `1`. An absent version sorts below any
/// present one.
#[must_use]
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let left: Vec<&str> = a.split('.').collect();
            let right: Vec<&str> = b.split('.').collect();
            let len = left.len().max(right.len());
            for i in 0..len {
                let l = left.get(i).copied().unwrap_or("0");
                let r = right.get(i).copied().unwrap_or("0");
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
    }
}
