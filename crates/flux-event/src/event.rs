//! Domain events.

use chrono::{DateTime, Utc};
use flux_types::EventId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key holding the correlation id.
pub const CORRELATION_ID: &str = "correlationId";
/// Metadata key set to `true` on replayed events.
pub const IS_REPLAY: &str = "isReplay";
/// Metadata key holding a replayed event's stored timestamp.
pub const ORIGINAL_TIMESTAMP: &str = "originalTimestamp";

/// A fact published on the bus.
///
/// Events are immutable once published: the bus hands subscribers a
/// shared reference, and storage keeps its own copy.
///
/// # Wire Shape
///
/// ```json
/// {
///   "id": "5c1d...",
///   "type": "process:created",
///   "timestamp": "2026-01-01T00:00:00Z",
///   "payload": { ... },
///   "metadata": { "correlationId": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique id.
    pub id: EventId,
    /// Event type, e.g. `task:completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Opaque payload.
    #[serde(default)]
    pub payload: Value,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DomainEvent {
    /// Creates an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            payload,
            metadata: Map::new(),
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets `metadata.correlationId`.
    #[must_use]
    pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
        self.with_metadata(CORRELATION_ID, Value::String(id.into()))
    }

    /// Returns `metadata.correlationId` if it is a string.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.get(CORRELATION_ID).and_then(Value::as_str)
    }

    /// Returns `true` if this is a replayed copy of a stored event.
    #[must_use]
    pub fn is_replay(&self) -> bool {
        self.metadata
            .get(IS_REPLAY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the stored timestamp of a replayed event.
    #[must_use]
    pub fn original_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(ORIGINAL_TIMESTAMP)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Builds the replayed copy published during replay.
    pub(crate) fn as_replay(&self, now: DateTime<Utc>) -> Self {
        let mut replay = self.clone();
        replay.timestamp = now;
        replay
            .metadata
            .insert(IS_REPLAY.to_string(), Value::Bool(true));
        replay.metadata.insert(
            ORIGINAL_TIMESTAMP.to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        replay
    }
}
