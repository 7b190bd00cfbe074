//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings shared by the ticker, the
//! schedulers and every module executor.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Execution context**: `Context::new(config, ..)` hands the bounds to executors
//!
//! ## Sentinel values
//! - `grace = 0s` → stop without waiting (shutdown reports `GraceExceeded` if anything is left)

use std::time::Duration;

use crate::policies::RetryPolicy;

/// Global configuration for the netvisor runtime.
///
/// ## Field semantics
/// - `tick`: Ticker period; every countdown in the system is counted in ticks
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: Maximum wait for the routine to stop at shutdown
/// - `spawn_wait`: How long a passive launch polls for its process output
/// - `interrupt`: How many times a passive stop re-interrupts live workers
/// - `term_grace`: Wait after each terminate/kill signal before checking liveness
/// - `join_bound`: Maximum wait for an in-flight output read when a communicator stops
/// - `drain_bound`: Maximum wait for pipe EOF after an active process exited
///
/// ## Notes
/// All fields are public for flexibility.
#[derive(Clone, Debug)]
pub struct Config {
    /// Ticker period (the "time unit" of all countdowns).
    pub tick: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum time to wait for the routine to stop at shutdown.
    pub grace: Duration,

    /// Polling schedule used by passive launches while waiting for the output pipe.
    ///
    /// The launch fails with `ModuleError::PipeUnavailable` once exhausted.
    pub spawn_wait: RetryPolicy,

    /// Interruption schedule for passive stops.
    ///
    /// Each attempt sends terminate, then kill to every live background worker.
    /// Once exhausted the stop returns `ModuleError::Unterminable`.
    pub interrupt: RetryPolicy,

    /// Time a process is given to exit after each terminate or kill signal.
    pub term_grace: Duration,

    /// Bound on joining an in-flight communicator read during interruption.
    pub join_bound: Duration,

    /// Bound on waiting for an exited active process's pipes to reach EOF.
    ///
    /// Grandchildren that inherited the pipes can keep them open; output
    /// captured so far is parsed once the bound is hit.
    pub drain_bound: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Converts a tick count into wall-clock time.
    #[inline]
    pub fn ticks(&self, n: u64) -> Duration {
        self.tick.saturating_mul(n.min(u64::from(u32::MAX)) as u32)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tick = 1s`
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    /// - `spawn_wait = 30 × 100ms` (about 3s)
    /// - `interrupt = 3 × 500ms`
    /// - `term_grace = 500ms`
    /// - `join_bound = 1s`
    /// - `drain_bound = 2s`
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
            spawn_wait: RetryPolicy::fixed(30, Duration::from_millis(100)),
            interrupt: RetryPolicy::fixed(3, Duration::from_millis(500)),
            term_grace: Duration::from_millis(500),
            join_bound: Duration::from_secs(1),
            drain_bound: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_scale_with_tick_period() {
        let cfg = Config {
            tick: Duration::from_millis(250),
            ..Config::default()
        };
        assert_eq!(cfg.ticks(4), Duration::from_secs(1));
    }

    #[test]
    fn bus_capacity_never_zero() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
