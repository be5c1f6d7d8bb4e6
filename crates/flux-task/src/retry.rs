//! Retry policy and backoff delays.
//!
//! The delay before retry `n + 1` depends only on the attempt that just
//! failed (`n`, 1-based) and the policy, never on previous delays:
//!
//! | Strategy | Delay after attempt `n` |
//! |----------|-------------------------|
//! | `fixed` | `initial` |
//! | `linear` | `initial × n` |
//! | `exponential` | `initial × 2^(n-1)` |
//!
//! Every result is capped at `max_delay`.

use crate::TaskFailure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How retry delays grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay every time.
    Fixed,
    /// Delay grows by `initial` each attempt.
    Linear,
    /// Delay doubles each attempt.
    #[default]
    Exponential,
}

impl BackoffStrategy {
    /// Delay after `attempt` (1-based) failed, capped at `max`.
    #[must_use]
    pub fn delay(self, initial: Duration, attempt: u32, max: Duration) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self {
            Self::Fixed => Some(initial),
            Self::Linear => initial.checked_mul(attempt),
            Self::Exponential => 2u32
                .checked_pow(attempt - 1)
                .and_then(|factor| initial.checked_mul(factor)),
        };
        raw.map_or(max, |d| d.min(max))
    }
}

/// Retry settings for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first. Must be at least 1.
    pub max_attempts: u32,
    /// How delays grow.
    pub backoff_strategy: BackoffStrategy,
    /// Base delay.
    pub initial_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
    /// Failure types worth retrying. Empty means every type.
    #[serde(default)]
    pub retryable_error_types: Vec<String>,
}

impl RetryPolicy {
    /// Creates an exponential policy with a 100 ms base and 30 s cap.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_strategy: BackoffStrategy::Exponential,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            retryable_error_types: Vec::new(),
        }
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the base delay and cap.
    #[must_use]
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Restricts retries to failures of `error_type`. May be called
    /// several times.
    #[must_use]
    pub fn retry_on(mut self, error_type: impl Into<String>) -> Self {
        self.retryable_error_types.push(error_type.into());
        self
    }

    /// Returns `true` if `failure` may be retried under this policy.
    #[must_use]
    pub fn is_retryable(&self, failure: &TaskFailure) -> bool {
        self.retryable_error_types.is_empty()
            || self
                .retryable_error_types
                .iter()
                .any(|t| *t == failure.error_type)
    }

    /// Delay after `attempt` (1-based) failed.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_strategy
            .delay(self.initial_delay, attempt, self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fixed_ignores_attempt() {
        for attempt in 1..5 {
            assert_eq!(
                BackoffStrategy::Fixed.delay(ms(100), attempt, ms(1000)),
                ms(100)
            );
        }
    }

    #[test]
    fn linear_grows_by_initial() {
        let delays: Vec<_> = (1..=4)
            .map(|n| BackoffStrategy::Linear.delay(ms(100), n, ms(250)))
            .collect();
        assert_eq!(delays, vec![ms(100), ms(200), ms(250), ms(250)]);
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let delays: Vec<_> = (1..=5)
            .map(|n| BackoffStrategy::Exponential.delay(ms(100), n, ms(1000)))
            .collect();
        assert_eq!(delays, vec![ms(100), ms(200), ms(400), ms(800), ms(1000)]);
    }

    #[test]
    fn exponential_overflow_caps() {
        assert_eq!(
            BackoffStrategy::Exponential.delay(ms(100), 200, ms(5000)),
            ms(5000)
        );
    }

    #[test]
    fn empty_filter_retries_everything() {
        let policy = RetryPolicy::new(3);
        assert!(policy.is_retryable(&TaskFailure::new("Anything", "x")));
    }

    #[test]
    fn filter_limits_retryable_types() {
        let policy = RetryPolicy::new(3).retry_on("NetworkError");
        assert!(policy.is_retryable(&TaskFailure::new("NetworkError", "reset")));
        assert!(!policy.is_retryable(&TaskFailure::new("ValidationError", "bad")));
    }

    #[test]
    fn policy_wire_shape() {
        let policy = RetryPolicy::new(2).with_backoff(BackoffStrategy::Linear);
        let value = serde_json::to_value(&policy).expect("serialize");
        assert_eq!(value["backoffStrategy"], serde_json::json!("linear"));
        assert_eq!(value["maxAttempts"], serde_json::json!(2));
    }
}
