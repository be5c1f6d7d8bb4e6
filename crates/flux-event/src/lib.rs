//! Domain event bus for the Flux runtime.
//!
//! # Overview
//!
//! The [`EventBus`] delivers [`DomainEvent`]s to subscribers by event
//! type. With persistence enabled every published event is also handed
//! to an [`EventStorage`] backend, which indexes it by type and by
//! `metadata.correlationId`. Stored events can later be correlated
//! ([`EventBus::correlate`]) or replayed ([`EventBus::replay_events`]).
//!
//! # Extension Points
//!
//! | Point | Params | Effect |
//! |-------|--------|--------|
//! | `event:beforePublish` | the event | may rewrite or reject |
//! | `event:afterPublish` | the event | observe |
//! | `event:beforeReplay` | `{from, to, eventTypes}` | may narrow or reject |
//!
//! # Ordering
//!
//! Subscribers of one type run in subscription order. Events of one
//! type reach a subscriber in the order `publish` was called; nothing
//! is promised across types.

mod bus;
mod error;
mod event;
mod handler;
mod storage;

pub use bus::{DeliveryFailure, DeliveryReport, EventBus, ReplayReport};
pub use error::EventError;
pub use event::{DomainEvent, CORRELATION_ID, IS_REPLAY, ORIGINAL_TIMESTAMP};
pub use handler::{EventHandler, FnHandler, HandlerRef, SubscriberError, Subscription};
pub use storage::{EventStorage, InMemoryEventStorage, TimeRange};
