//! Exponential backoff schedule for deployment retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy: `delay = base * 2^(attempt - 1)`, capped at `max_delay`.
///
/// Pure function of the attempt number, so retry schedules are testable
/// without wall-clock time; sleeping is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub base: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// Create an exponential policy with the given base and cap.
    pub fn exponential(base: Duration, max_delay: Duration) -> Self {
        Self { base, max_delay }
    }

    /// Delay to wait after `attempt` (1-based) before the next attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let millis = (self.base.as_millis() as u64).saturating_mul(1u64 << exp);
        Duration::from_millis(millis).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}
