//! Cooperative cancellation with observer callbacks.
//!
//! [`CancellationToken`] wraps [`tokio_util::sync::CancellationToken`]
//! and adds a callback list, so synchronous code can react to
//! cancellation without polling.

use parking_lot::Mutex;
use std::sync::Arc;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Observers {
    fired: bool,
    callbacks: Vec<Callback>,
}

/// Cancellation handle shared by every attempt of one execution.
///
/// Clones share state. Cancelling is idempotent: callbacks run once,
/// synchronously, on the thread that first calls [`cancel`](Self::cancel).
///
/// # Example
///
/// ```
/// use flux_task::CancellationToken;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let token = CancellationToken::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&hits);
/// token.on_cancellation_requested(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// token.cancel();
/// token.cancel();
/// assert!(token.is_cancellation_requested());
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
    observers: Arc<Mutex<Observers>>,
}

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and runs registered callbacks.
    pub fn cancel(&self) {
        let callbacks = {
            let mut observers = self.observers.lock();
            if observers.fired {
                return;
            }
            observers.fired = true;
            self.inner.cancel();
            std::mem::take(&mut observers.callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Registers a callback run on cancellation.
    ///
    /// If the token is already cancelled the callback runs immediately,
    /// and [`is_cancellation_requested`](Self::is_cancellation_requested)
    /// already reports `true` inside it.
    pub fn on_cancellation_requested(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut observers = self.observers.lock();
            if !observers.fired {
                observers.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancellation_requested())
            .finish()
    }
}
