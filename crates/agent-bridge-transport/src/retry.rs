//! Bounded retry with exponential backoff and jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy for connection setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before giving up, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure (milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound for a single delay (milliseconds).
    pub max_delay_ms: u64,
    /// Fraction of the delay added as random jitter (0.0 - 1.0).
    pub jitter: f64,
    /// Overall budget across attempts (seconds).
    pub deadline_secs: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
            deadline_secs: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that tries exactly once.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Overall deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 2.0_f64.powi(attempt.saturating_sub(1).min(10) as i32);
        let delay = (self.base_delay_ms as f64 * exp).min(self.max_delay_ms as f64);
        let jitter = delay * self.jitter.clamp(0.0, 1.0) * rand::random::<f64>();
        Duration::from_millis(((delay + jitter) as u64).min(self.max_delay_ms))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    #[must_use]
    pub const fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
