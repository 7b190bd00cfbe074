//! Geometric delays between retry attempts.
//!
//! Attempt `n` (0-indexed) waits `first * factor^n`, never more than `max`.
//! A factor of `1.0` gives a constant delay, which is what the spawn-wait and
//! interrupt loops use by default.
//!
//! ```rust
//! use std::time::Duration;
//! use netvisor::BackoffPolicy;
//!
//! let polling = BackoffPolicy::exponential(Duration::from_millis(50), 3.0, Duration::from_secs(1));
//! assert_eq!(polling.delay_for(0), Duration::from_millis(50));
//! assert_eq!(polling.delay_for(2), Duration::from_millis(450));
//! assert_eq!(polling.delay_for(3), Duration::from_secs(1));
//! ```

use std::time::Duration;

/// How long to wait before retry number `n`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub first: Duration,
    /// Upper bound of any single delay.
    pub max: Duration,
    /// Growth per attempt; values below `1.0` shrink the delay.
    pub factor: f64,
}

impl BackoffPolicy {
    /// The same `delay` before every attempt.
    pub const fn constant(delay: Duration) -> Self {
        Self::exponential(delay, 1.0, delay)
    }

    /// Starts at `first` and multiplies by `factor` each attempt, up to `max`.
    pub const fn exponential(first: Duration, factor: f64, max: Duration) -> Self {
        Self { first, max, factor }
    }

    /// Delay preceding attempt `attempt + 1`.
    ///
    /// Results that overflow, go negative or are not finite saturate at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_until_capped() {
        let policy = BackoffPolicy::exponential(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(500),
        );
        let delays: Vec<u128> = (0..5).map(|a| policy.delay_for(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn constant_ignores_attempt_number() {
        let policy = BackoffPolicy::constant(Duration::from_millis(250));
        assert!((0..8).all(|a| policy.delay_for(a) == Duration::from_millis(250)));
    }

    #[test]
    fn oversized_first_delay_is_capped() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(10), 1.0, Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
    }

    #[test]
    fn huge_exponents_saturate() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(1), 10.0, Duration::from_secs(3));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(3));
    }

    #[test]
    fn negative_factor_falls_back_to_max() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(10), -2.0, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    }
}
