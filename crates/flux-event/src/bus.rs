//! EventBus: publish/subscribe with optional persistence and replay.
//!
//! # Publish Pipeline
//!
//! ```text
//! publish(event)
//!     │
//!     ▼ event:beforePublish      (may rewrite or reject)
//!     ▼ dispatch to subscribers  (registration order, failures collected)
//!     ▼ store_event              (only with persistence enabled)
//!     ▼ event:afterPublish
//!     │
//!     └─► DeliveryReport
//! ```
//!
//! Replay runs the same pipeline minus the store step, on copies
//! tagged with `metadata.isReplay = true`.

use crate::{
    DomainEvent, EventError, EventStorage, HandlerRef, Subscription, TimeRange,
};
use chrono::{DateTime, Utc};
use flux_hook::{ExtensionPoint, ExtensionSystem};
use flux_types::{EventId, SubscriptionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One subscriber that failed to handle an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    /// The failing subscription.
    pub subscription: SubscriptionId,
    /// The subscriber's error message.
    pub message: String,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// The dispatched event.
    pub event_id: EventId,
    /// Subscribers that handled the event successfully.
    pub delivered: usize,
    /// Subscribers that failed.
    pub failures: Vec<DeliveryFailure>,
    /// Whether the event was stored.
    pub persisted: bool,
}

impl DeliveryReport {
    /// Returns `true` if every subscriber succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Number of events re-published.
    pub replayed: usize,
    /// Subscriber failures across all replayed events.
    pub failures: Vec<DeliveryFailure>,
}

/// Replay window as seen (and possibly narrowed) by `event:beforeReplay` hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayWindow {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    #[serde(default)]
    event_types: Option<Vec<String>>,
}

struct Subscriber {
    id: SubscriptionId,
    handler: HandlerRef,
}

/// Publish/subscribe event bus.
///
/// # Thread Safety
///
/// `EventBus` is `Send + Sync`; share it behind an `Arc`. Subscriber
/// lists and the storage handle are snapshotted before any `.await`,
/// so handlers may subscribe, unsubscribe, or publish re-entrantly.
///
/// # Example
///
/// ```
/// use flux_event::{DomainEvent, EventBus, FnHandler};
/// use flux_hook::ExtensionSystem;
/// use std::sync::Arc;
///
/// let bus = EventBus::new(Arc::new(ExtensionSystem::new()));
/// let sub = bus.subscribe("task:completed", FnHandler::arc(|_event| async { Ok::<_, flux_event::SubscriberError>(()) }));
/// assert_eq!(bus.subscriber_count("task:completed"), 1);
/// assert!(bus.unsubscribe(&sub));
/// ```
pub struct EventBus {
    extensions: Arc<ExtensionSystem>,
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    storage: RwLock<Option<Arc<dyn EventStorage>>>,
}

impl EventBus {
    /// Creates a bus that runs `event:*` hooks on `extensions`.
    #[must_use]
    pub fn new(extensions: Arc<ExtensionSystem>) -> Self {
        Self {
            extensions,
            subscribers: RwLock::new(HashMap::new()),
            storage: RwLock::new(None),
        }
    }

    // === Subscriptions ===

    /// Subscribes `handler` to events of `event_type`.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: HandlerRef) -> Subscription {
        let event_type = event_type.into();
        let id = SubscriptionId::new();
        self.subscribers
            .write()
            .entry(event_type.clone())
            .or_default()
            .push(Subscriber { id, handler });
        debug!(subscription = %id, event_type = %event_type, "subscribed");
        Subscription { id, event_type }
    }

    /// Removes a subscription. Returns `true` if it existed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(&subscription.event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != subscription.id);
        let removed = list.len() < before;
        if list.is_empty() {
            subscribers.remove(&subscription.event_type);
        }
        if removed {
            debug!(subscription = %subscription.id, "unsubscribed");
        }
        removed
    }

    /// Number of subscribers for `event_type`.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .read()
            .get(event_type)
            .map_or(0, Vec::len)
    }

    // === Persistence ===

    /// Stores every subsequently published event in `storage`.
    pub fn enable_persistence(&self, storage: Arc<dyn EventStorage>) {
        *self.storage.write() = Some(storage);
        info!("event persistence enabled");
    }

    /// Stops storing events. Already stored events stay in the backend.
    pub fn disable_persistence(&self) {
        *self.storage.write() = None;
        info!("event persistence disabled");
    }

    /// Returns `true` if a storage backend is attached.
    #[must_use]
    pub fn is_persistence_enabled(&self) -> bool {
        self.storage.read().is_some()
    }

    fn storage(&self) -> Result<Arc<dyn EventStorage>, EventError> {
        self.storage
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(EventError::PersistenceDisabled)
    }

    // === Publishing ===

    /// Publishes an event.
    ///
    /// Subscriber failures are collected in the returned report; they
    /// never prevent delivery to other subscribers.
    ///
    /// # Errors
    ///
    /// - [`EventError::Hook`] if an `event:beforePublish` or
    ///   `event:afterPublish` hook fails (a before-hook failure means
    ///   nothing was delivered)
    /// - [`EventError::InvalidEvent`] if a hook rewrote the event into
    ///   something that is not an event
    /// - storage errors when persistence is enabled
    pub async fn publish(&self, event: DomainEvent) -> Result<DeliveryReport, EventError> {
        self.publish_inner(event, true).await
    }

    /// Stores an event without dispatching it or running hooks.
    ///
    /// # Errors
    ///
    /// [`EventError::PersistenceDisabled`] without a storage backend,
    /// otherwise whatever the backend returns.
    pub async fn persist_event(&self, event: &DomainEvent) -> Result<(), EventError> {
        self.storage()?.store_event(event).await
    }

    /// Returns every stored event with `metadata.correlationId == id`,
    /// in publish order.
    ///
    /// # Errors
    ///
    /// [`EventError::PersistenceDisabled`] without a storage backend.
    pub async fn correlate(&self, correlation_id: &str) -> Result<Vec<DomainEvent>, EventError> {
        self.storage()?
            .get_events_by_correlation_id(correlation_id)
            .await
    }

    /// Re-publishes stored events from `[from, to]`, oldest first.
    ///
    /// `event:beforeReplay` runs once with `{from, to, eventTypes}` and
    /// may narrow or reject the window. Each replayed copy carries
    /// `metadata.isReplay = true` and `metadata.originalTimestamp`, and
    /// is not stored again.
    ///
    /// # Errors
    ///
    /// - [`EventError::PersistenceDisabled`] without a storage backend
    /// - [`EventError::InvalidWindow`] if `from > to`
    /// - [`EventError::Hook`] if a replay or publish hook fails; events
    ///   replayed before the failure stay delivered
    pub async fn replay_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        event_types: Option<Vec<String>>,
    ) -> Result<ReplayReport, EventError> {
        let storage = self.storage()?;

        let window = ReplayWindow {
            from,
            to,
            event_types,
        };
        let params = serde_json::to_value(&window)
            .map_err(|e| EventError::InvalidEvent(e.to_string()))?;
        let params = self
            .extensions
            .execute_extension_point(ExtensionPoint::EventBeforeReplay, params)
            .await?;
        let window: ReplayWindow = serde_json::from_value(params)
            .map_err(|e| EventError::InvalidEvent(format!("replay window: {e}")))?;
        if window.from > window.to {
            return Err(EventError::InvalidWindow {
                from: window.from,
                to: window.to,
            });
        }

        let range = TimeRange::between(window.from, window.to);
        let mut events = match &window.event_types {
            Some(types) => {
                let mut merged = Vec::new();
                let mut seen = HashSet::new();
                for event_type in types.iter().filter(|t| seen.insert(t.as_str())) {
                    merged.extend(storage.get_events_by_type(event_type, range).await?);
                }
                merged
            }
            None => storage.get_all_events(range).await?,
        };
        events.sort_by_key(|e| e.timestamp);

        info!(
            from = %window.from,
            to = %window.to,
            events = events.len(),
            "replaying events"
        );

        let mut report = ReplayReport::default();
        for stored in events {
            let delivery = self.publish_inner(stored.as_replay(Utc::now()), false).await?;
            report.replayed += 1;
            report.failures.extend(delivery.failures);
        }
        Ok(report)
    }

    async fn publish_inner(
        &self,
        event: DomainEvent,
        store: bool,
    ) -> Result<DeliveryReport, EventError> {
        let params =
            serde_json::to_value(&event).map_err(|e| EventError::InvalidEvent(e.to_string()))?;
        let params = self
            .extensions
            .execute_extension_point(ExtensionPoint::EventBeforePublish, params)
            .await?;
        let event: DomainEvent =
            serde_json::from_value(params).map_err(|e| EventError::InvalidEvent(e.to_string()))?;

        let mut report = self.dispatch(&event).await;

        if store {
            let storage = self.storage.read().as_ref().map(Arc::clone);
            if let Some(storage) = storage {
                storage.store_event(&event).await?;
                report.persisted = true;
            }
        }

        let params =
            serde_json::to_value(&event).map_err(|e| EventError::InvalidEvent(e.to_string()))?;
        self.extensions
            .execute_extension_point(ExtensionPoint::EventAfterPublish, params)
            .await?;

        Ok(report)
    }

    async fn dispatch(&self, event: &DomainEvent) -> DeliveryReport {
        let targets: Vec<(SubscriptionId, HandlerRef)> = self
            .subscribers
            .read()
            .get(&event.event_type)
            .map(|list| {
                list.iter()
                    .map(|s| (s.id, Arc::clone(&s.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = DeliveryReport {
            event_id: event.id,
            delivered: 0,
            failures: Vec::new(),
            persisted: false,
        };
        for (id, handler) in targets {
            match handler.handle(event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        subscription = %id,
                        event_type = %event.event_type,
                        event_id = %event.id,
                        error = %e,
                        "subscriber failed"
                    );
                    report.failures.push(DeliveryFailure {
                        subscription: id,
                        message: e.message,
                    });
                }
            }
        }
        debug!(
            event_type = %event.event_type,
            delivered = report.delivered,
            failed = report.failures.len(),
            "event dispatched"
        );
        report
    }
}
