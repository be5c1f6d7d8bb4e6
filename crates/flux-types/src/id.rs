//! Identifier types for Flux.
//!
//! Runtime-generated identifiers (events, process instances,
//! checkpoints, task executions, subscriptions) are UUID v4 newtypes.
//! Author-chosen identifiers (process definition ids, task ids,
//! extension ids) stay plain strings at the API surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[doc = concat!("Creates a new [`", stringify!($name), "`] with a random UUID v4.")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the inner UUID.
            #[must_use]
            pub fn uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from its bare UUID form.
            ///
            /// # Errors
            ///
            /// Returns the UUID parse error if `s` is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s.trim_start_matches($prefix)).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier for a domain event published on the bus.
    ///
    /// ```
    /// use flux_types::EventId;
    ///
    /// let a = EventId::new();
    /// let b = EventId::new();
    /// assert_ne!(a, b);
    /// assert!(a.to_string().starts_with("evt:"));
    /// ```
    EventId,
    "evt:"
);

uuid_id!(
    /// Identifier for a running process instance.
    ProcessId,
    "proc:"
);

uuid_id!(
    /// Identifier for an immutable process checkpoint.
    CheckpointId,
    "ckpt:"
);

uuid_id!(
    /// Identifier for one invocation of `execute_task`.
    ///
    /// Every retry attempt of the same invocation shares this id.
    ExecutionId,
    "exec:"
);

uuid_id!(
    /// Identifier for an event bus subscription.
    SubscriptionId,
    "sub:"
);
