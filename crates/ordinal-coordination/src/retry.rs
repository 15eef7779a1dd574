//! Linear-backoff retry policy shared by the recipes.

use std::time::Duration;

use ordinal_constants::clock::DEFAULT_RETRY_COUNT;
use ordinal_constants::clock::DEFAULT_RETRY_DELAY_MS;

/// Bounded retry with linear backoff.
///
/// Attempt `n` (zero-based) that fails with a connection-class error is
/// followed by a sleep of `n * base_delay`, so the first retry is immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_COUNT, Duration::from_millis(DEFAULT_RETRY_DELAY_MS))
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Total attempts allowed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Base delay multiplied by the attempt index.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Sleep that follows a failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt may follow attempt `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.attempts
    }

    pub(crate) async fn backoff(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_is_immediate() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.attempts(), 1);
        assert!(!policy.has_next(0));
    }

    #[test]
    fn has_next_respects_bound() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.has_next(0));
        assert!(policy.has_next(1));
        assert!(!policy.has_next(2));
    }

    #[test]
    fn defaults_match_constants() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 10);
        assert_eq!(policy.base_delay(), Duration::from_millis(100));
    }
}
