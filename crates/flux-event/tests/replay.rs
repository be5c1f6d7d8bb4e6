//! Replay tests against the in-memory store.

use chrono::{DateTime, Duration, Utc};
use flux_event::{
    DomainEvent, EventBus, EventError, EventStorage, FnHandler, HandlerRef, InMemoryEventStorage,
    SubscriberError, TimeRange,
};
use flux_hook::testing::MockHook;
use flux_hook::{Extension, ExtensionPoint, ExtensionSystem, HookError};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

type Seen = Arc<Mutex<Vec<DomainEvent>>>;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
}

fn recorder(seen: &Seen) -> HandlerRef {
    let seen = Arc::clone(seen);
    FnHandler::arc(move |event| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().push(event);
            Ok::<_, SubscriberError>(())
        }
    })
}

async fn seeded_bus(ext: Arc<ExtensionSystem>) -> (EventBus, Arc<InMemoryEventStorage>) {
    let bus = EventBus::new(ext);
    let storage = Arc::new(InMemoryEventStorage::new());
    bus.enable_persistence(storage.clone());

    for (name, secs) in [("A", 10), ("B", 20), ("C", 30)] {
        let event = DomainEvent::new("order:placed", json!({"name": name})).with_timestamp(at(secs));
        bus.publish(event).await.expect("seed publish");
    }
    (bus, storage)
}

fn names(events: &[DomainEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.payload["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn replay_window_republishes_in_order_without_storing() {
    let (bus, storage) = seeded_bus(Arc::new(ExtensionSystem::new())).await;
    let seen: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&seen));

    let report = bus
        .replay_events(at(10), at(20), None)
        .await
        .expect("replay");

    assert_eq!(report.replayed, 2);
    assert!(report.failures.is_empty());

    let seen = seen.lock();
    assert_eq!(names(&seen), vec!["A", "B"]);
    assert!(seen.iter().all(DomainEvent::is_replay));
    assert_eq!(seen[0].original_timestamp(), Some(at(10)));
    assert_eq!(seen[1].original_timestamp(), Some(at(20)));

    assert_eq!(storage.len(), 3);
    let stored = storage
        .get_all_events(TimeRange::all())
        .await
        .expect("query");
    assert!(stored.iter().all(|e| !e.is_replay()));
}

#[tokio::test]
async fn replay_filters_by_event_type() {
    let (bus, _storage) = seeded_bus(Arc::new(ExtensionSystem::new())).await;
    bus.publish(DomainEvent::new("order:shipped", json!({"name": "S"})).with_timestamp(at(15)))
        .await
        .expect("publish");

    let placed: Seen = Arc::default();
    let shipped: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&placed));
    bus.subscribe("order:shipped", recorder(&shipped));

    let report = bus
        .replay_events(at(0), at(100), Some(vec!["order:shipped".into()]))
        .await
        .expect("replay");
    assert_eq!(report.replayed, 1);
    assert!(placed.lock().is_empty());
    assert_eq!(names(&shipped.lock()), vec!["S"]);
}

#[tokio::test]
async fn repeated_event_types_replay_once() {
    let (bus, _storage) = seeded_bus(Arc::new(ExtensionSystem::new())).await;
    let seen: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&seen));

    let report = bus
        .replay_events(
            at(0),
            at(100),
            Some(vec!["order:placed".into(), "order:placed".into()]),
        )
        .await
        .expect("replay");
    assert_eq!(report.replayed, 3);
    assert_eq!(names(&seen.lock()), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn before_replay_hook_can_narrow_window() {
    let ext = Arc::new(ExtensionSystem::new());
    let narrowed_to = at(10).to_rfc3339();
    ext.register_extension(Extension::new("narrow", "Narrow").with_hook(Arc::new(
        MockHook::modifier("narrow", ExtensionPoint::EventBeforeReplay, move |p| {
            p["to"] = json!(narrowed_to.clone());
        }),
    )))
    .expect("register");

    let (bus, _storage) = seeded_bus(ext).await;
    let seen: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&seen));

    let report = bus
        .replay_events(at(0), at(100), None)
        .await
        .expect("replay");
    assert_eq!(report.replayed, 1);
    assert_eq!(names(&seen.lock()), vec!["A"]);
}

#[tokio::test]
async fn before_replay_rejection_replays_nothing() {
    let ext = Arc::new(ExtensionSystem::new());
    ext.register_extension(Extension::new("veto", "Veto").with_hook(Arc::new(
        MockHook::rejecter("veto", ExtensionPoint::EventBeforeReplay, "maintenance"),
    )))
    .expect("register");

    let (bus, _storage) = seeded_bus(ext).await;
    let seen: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&seen));

    let err = bus
        .replay_events(at(0), at(100), None)
        .await
        .expect_err("hook should reject");
    assert!(matches!(err, EventError::Hook(HookError::Rejected { .. })));
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn replay_rejects_inverted_window() {
    let (bus, _storage) = seeded_bus(Arc::new(ExtensionSystem::new())).await;
    let err = bus
        .replay_events(at(20), at(10), None)
        .await
        .expect_err("inverted window");
    assert!(matches!(err, EventError::InvalidWindow { .. }));
}

#[tokio::test]
async fn replay_requires_persistence() {
    let bus = EventBus::new(Arc::new(ExtensionSystem::new()));
    let now = Utc::now();
    let err = bus
        .replay_events(now - Duration::hours(1), now, None)
        .await
        .expect_err("no storage");
    assert!(matches!(err, EventError::PersistenceDisabled));
}

#[tokio::test]
async fn replay_does_not_disturb_live_subscribers() {
    let (bus, _storage) = seeded_bus(Arc::new(ExtensionSystem::new())).await;
    let seen: Seen = Arc::default();
    bus.subscribe("order:placed", recorder(&seen));

    bus.replay_events(at(0), at(100), None)
        .await
        .expect("replay");
    bus.publish(DomainEvent::new("order:placed", json!({"name": "live"})))
        .await
        .expect("publish");

    let seen = seen.lock();
    assert_eq!(names(&seen), vec!["A", "B", "C", "live"]);
    assert!(!seen[3].is_replay());
}
