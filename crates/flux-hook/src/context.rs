//! Hook context: the read-only view passed to hook handlers.

use crate::ExtensionPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Default maximum nesting depth for extension-point execution.
pub const DEFAULT_MAX_DEPTH: u8 = 4;

/// Context passed to hook handlers alongside the in-flight params.
///
/// The context is immutable for hooks: everything a hook may change
/// flows through the params value it returns. `metadata` and `config`
/// are snapshots taken when the chain started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    /// Which extension point is executing.
    pub point: ExtensionPoint,

    /// When the chain started.
    pub started_at: DateTime<Utc>,

    /// Caller-supplied metadata (operation ids, correlation ids, ...).
    pub metadata: HashMap<String, Value>,

    /// Runtime-wide configuration snapshot.
    pub config: Arc<Value>,

    /// Nesting depth. Zero for a top-level execution.
    pub depth: u8,

    /// Maximum nesting depth.
    pub max_depth: u8,
}

impl HookContext {
    /// Creates a top-level context for `point`.
    #[must_use]
    pub fn new(point: ExtensionPoint, config: Arc<Value>) -> Self {
        Self {
            point,
            started_at: Utc::now(),
            metadata: HashMap::new(),
            config,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Returns a context for a nested execution of `point`.
    ///
    /// Metadata and config carry over; depth is incremented.
    #[must_use]
    pub fn nested(&self, point: ExtensionPoint) -> Self {
        Self {
            point,
            started_at: Utc::now(),
            metadata: self.metadata.clone(),
            config: Arc::clone(&self.config),
            depth: self.depth.saturating_add(1),
            max_depth: self.max_depth,
        }
    }

    /// Returns `true` if the current depth has reached or exceeded `max_depth`.
    #[must_use]
    pub fn is_depth_exceeded(&self) -> bool {
        self.depth >= self.max_depth
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Looks up a metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}
