//! # Bounded retry policy.
//!
//! [`RetryPolicy`] pairs a maximum attempt count with a [`BackoffPolicy`].
//! It never retries forever: callers report a failure once `attempts` is spent.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Bounded number of attempts separated by backoff delays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (`0` is treated as `1`).
    pub attempts: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// Creates a policy with `attempts` tries separated by a constant `delay`.
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            backoff: BackoffPolicy::constant(delay),
        }
    }

    /// Attempt count clamped to at least one.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Delay to sleep after the given failed attempt (0-indexed).
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.delay_for(attempt)
    }

    /// Upper bound of the total time spent sleeping between attempts.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts().saturating_sub(1))
            .map(|a| self.delay_after(a))
            .sum()
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 100ms apart.
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::fixed(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.total_delay(), Duration::ZERO);
    }

    #[test]
    fn total_delay_sums_gaps_between_attempts() {
        let policy = RetryPolicy::fixed(4, Duration::from_millis(250));
        assert_eq!(policy.total_delay(), Duration::from_millis(750));
    }
}
