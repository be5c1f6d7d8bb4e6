//! Event storage abstraction and the in-memory reference store.
//!
//! # Lookup Contracts
//!
//! | Lookup | Filter | Order |
//! |--------|--------|-------|
//! | [`EventStorage::get_events_by_type`] | type + time range | ascending timestamp |
//! | [`EventStorage::get_events_by_correlation_id`] | `metadata.correlationId` | store order |
//! | [`EventStorage::get_all_events`] | time range | ascending timestamp |
//!
//! Time ranges are inclusive at both ends.

use crate::{DomainEvent, EventError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flux_types::EventId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Inclusive time window. An absent bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Earliest timestamp included.
    pub from: Option<DateTime<Utc>>,
    /// Latest timestamp included.
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Unbounded range.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Range bounded on both ends.
    #[must_use]
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns `true` if `ts` lies within the range.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }
}

/// Event persistence backend.
///
/// Implementations must be thread-safe (`Send + Sync`); the bus holds
/// one behind an `Arc` and calls it from any task.
#[async_trait]
pub trait EventStorage: Send + Sync {
    /// Stores an event and indexes it by type and correlation id.
    async fn store_event(&self, event: &DomainEvent) -> Result<(), EventError>;

    /// Events of one type within `range`, ascending by timestamp.
    async fn get_events_by_type(
        &self,
        event_type: &str,
        range: TimeRange,
    ) -> Result<Vec<DomainEvent>, EventError>;

    /// Events carrying `metadata.correlationId == id`, in store order.
    async fn get_events_by_correlation_id(&self, id: &str)
        -> Result<Vec<DomainEvent>, EventError>;

    /// All events within `range`, ascending by timestamp.
    async fn get_all_events(&self, range: TimeRange) -> Result<Vec<DomainEvent>, EventError>;
}

#[derive(Default)]
struct Inner {
    events: HashMap<EventId, DomainEvent>,
    /// Ids in store order.
    order: Vec<EventId>,
    by_type: HashMap<String, Vec<EventId>>,
    by_correlation: HashMap<String, Vec<EventId>>,
}

impl Inner {
    fn collect(&self, ids: &[EventId], range: TimeRange) -> Vec<DomainEvent> {
        let mut out: Vec<DomainEvent> = ids
            .iter()
            .filter_map(|id| self.events.get(id))
            .filter(|e| range.contains(e.timestamp))
            .cloned()
            .collect();
        // Stable: equal timestamps keep store order.
        out.sort_by_key(|e| e.timestamp);
        out
    }
}

/// In-memory [`EventStorage`].
///
/// Keeps events keyed by id with secondary indexes by type and by
/// correlation id. With a retention window, events older than
/// `now - retention` are dropped on every store and on
/// [`prune_expired`](Self::prune_expired).
#[derive(Default)]
pub struct InMemoryEventStorage {
    inner: RwLock<Inner>,
    retention: Option<chrono::Duration>,
}

impl InMemoryEventStorage {
    /// Creates an empty store that keeps events forever.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a retention window.
    ///
    /// A window too large to represent keeps events forever.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            inner: RwLock::default(),
            retention: chrono::Duration::from_std(retention).ok(),
        }
    }

    /// Drops every event older than the retention window relative to
    /// `now`. Returns the number of events dropped.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return 0;
        };

        let mut inner = self.inner.write();
        let expired: Vec<EventId> = inner
            .order
            .iter()
            .filter(|id| inner.events.get(*id).is_some_and(|e| e.timestamp < cutoff))
            .copied()
            .collect();
        if expired.is_empty() {
            return 0;
        }

        for id in &expired {
            inner.events.remove(id);
        }
        let Inner {
            events,
            order,
            by_type,
            by_correlation,
        } = &mut *inner;
        order.retain(|id| events.contains_key(id));
        for ids in by_type.values_mut().chain(by_correlation.values_mut()) {
            ids.retain(|id| events.contains_key(id));
        }
        by_type.retain(|_, ids| !ids.is_empty());
        by_correlation.retain(|_, ids| !ids.is_empty());

        debug!(pruned = expired.len(), "expired events pruned");
        expired.len()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStorage for InMemoryEventStorage {
    async fn store_event(&self, event: &DomainEvent) -> Result<(), EventError> {
        self.prune_expired(Utc::now());

        let mut inner = self.inner.write();
        if inner.events.contains_key(&event.id) {
            return Err(EventError::DuplicateEvent(event.id));
        }
        inner.order.push(event.id);
        inner
            .by_type
            .entry(event.event_type.clone())
            .or_default()
            .push(event.id);
        if let Some(correlation_id) = event.correlation_id() {
            inner
                .by_correlation
                .entry(correlation_id.to_string())
                .or_default()
                .push(event.id);
        }
        inner.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_events_by_type(
        &self,
        event_type: &str,
        range: TimeRange,
    ) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self.inner.read();
        Ok(inner
            .by_type
            .get(event_type)
            .map(|ids| inner.collect(ids, range))
            .unwrap_or_default())
    }

    async fn get_events_by_correlation_id(
        &self,
        id: &str,
    ) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self.inner.read();
        Ok(inner
            .by_correlation
            .get(id)
            .map(|ids| ids.iter().filter_map(|id| inner.events.get(id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_all_events(&self, range: TimeRange) -> Result<Vec<DomainEvent>, EventError> {
        let inner = self.inner.read();
        Ok(inner.collect(&inner.order, range))
    }
}
