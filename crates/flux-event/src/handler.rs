//! Subscriber handlers and subscription handles.

use crate::DomainEvent;
use async_trait::async_trait;
use flux_types::SubscriptionId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a subscriber.
///
/// Subscriber failures never stop delivery to other subscribers; the
/// bus collects them into a [`DeliveryReport`](crate::DeliveryReport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubscriberError {
    /// Human-readable reason.
    pub message: String,
}

impl SubscriberError {
    /// Creates a subscriber error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Handles events of one type.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    async fn handle(&self, event: &DomainEvent) -> Result<(), SubscriberError>;
}

/// Shared handle to a subscriber.
pub type HandlerRef = Arc<dyn EventHandler>;

/// Closure-backed handler.
///
/// The closure receives an owned clone of the event.
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
{
    /// Wraps a closure as a shared handler.
    pub fn arc(f: F) -> HandlerRef {
        Arc::new(Self { f })
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
{
    async fn handle(&self, event: &DomainEvent) -> Result<(), SubscriberError> {
        (self.f)(event.clone()).await
    }
}

/// Handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Event type subscribed to.
    pub event_type: String,
}
