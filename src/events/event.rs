//! # Runtime events emitted by the ticker, schedulers and module executors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Ticker events**: start/stop and per-subscriber failures
//! - **Execution events**: process launch, exit, timeout, output delivery
//! - **Scheduling events**: entries added/removed, schedulers paused/resumed
//! - **Runtime events**: subscriber health and shutdown
//!
//! The [`Event`] struct carries metadata such as timestamps, module id,
//! set id, exit codes and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use netvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ModuleTimedOut)
//!     .with_module("nmap")
//!     .with_set_id("nmap1")
//!     .with_timeout(Duration::from_secs(340));
//!
//! assert_eq!(ev.kind, EventKind::ModuleTimedOut);
//! assert_eq!(ev.module.as_deref(), Some("nmap"));
//! assert_eq!(ev.timeout_ms, Some(340_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `module`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `module`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Ticker events ===
    /// Ticker loop started.
    TickerStarted,

    /// `start()` was called on a ticker that is already running.
    TickerAlreadyRunning,

    /// Ticker loop asked to stop.
    TickerStopped,

    /// A ticker subscriber panicked inside `decrement()`; the tick went on.
    ///
    /// Sets:
    /// - `reason`: panic info/message
    DecrementPanicked,

    // === Execution events ===
    /// A module process was spawned.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `pid`: OS process id
    /// - `reason`: rendered command line
    ModuleLaunched,

    /// A module process exited and its output was handed to the parser.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `exit_code`: exit code (`-N` when killed by signal `N`)
    /// - `bytes`: size of the captured output
    ModuleExited,

    /// An active module exceeded its maximum duration.
    /// The process is **not** terminated by this.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `timeout_ms`: configured maximum duration
    /// - `pid`: OS process id
    ModuleTimedOut,

    /// The module program could not be started.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `reason`: spawn error
    LaunchFailed,

    /// A passive process never exposed its output within the spawn wait.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `attempt`: number of polls performed
    PipeUnavailable,

    /// A communicator delivered one polling buffer to the parser.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `bytes`: buffer size
    OutputDelivered,

    /// A communicator read was still in flight when the next one came due.
    ///
    /// Sets:
    /// - `module`: module id
    ReadOverrun,

    /// A communicator read did not finish within the join bound and was aborted.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `timeout_ms`: join bound
    ReaderStuck,

    /// Workers were asked to terminate.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `attempt`: interruption attempt (1-based)
    InterruptRequested,

    /// Workers survived every interruption attempt.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `attempt`: number of attempts made
    InterruptFailed,

    // === Scheduling events ===
    /// An entry was added to a scheduler.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `set_id`: assigned set id
    /// - `reason`: scheduler name ("queue" / "panel")
    EntryAdded,

    /// An entry was refused.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `reason`: error label
    EntryRejected,

    /// An entry was removed from a scheduler.
    ///
    /// Sets:
    /// - `set_id`: removed set id
    EntryRemoved,

    /// A queue entry reached zero and launched its module.
    ///
    /// Sets:
    /// - `module`: module id
    /// - `set_id`: entry set id
    EntryFired,

    /// A scheduler resumed.
    ///
    /// Sets:
    /// - `reason`: scheduler name ("queue" / "panel")
    SchedulerResumed,

    /// A scheduler paused.
    ///
    /// Sets:
    /// - `reason`: scheduler name ("queue" / "panel")
    SchedulerPaused,

    // === Shutdown events ===
    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// Everything stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers did not stop in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Module id (or subscriber name for subscriber events).
    pub module: Option<Arc<str>>,
    /// Scheduler-local set id.
    pub set_id: Option<Arc<str>>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Timeout or bound in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Byte count of delivered output.
    pub bytes: Option<usize>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Human-readable reason (errors, command lines, scheduler names).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            module: None,
            set_id: None,
            pid: None,
            exit_code: None,
            timeout_ms: None,
            bytes: None,
            attempt: None,
            reason: None,
        }
    }

    /// Attaches a module id.
    #[inline]
    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches a set id.
    #[inline]
    pub fn with_set_id(mut self, set_id: impl Into<Arc<str>>) -> Self {
        self.set_id = Some(set_id.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a byte count.
    #[inline]
    pub fn with_bytes(mut self, n: usize) -> Self {
        self.bytes = Some(n);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_module(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_module(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::TickerStarted);
        let b = Event::new(EventKind::TickerStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_saturates_at_u32() {
        let ev = Event::new(EventKind::ModuleTimedOut).with_timeout(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn panic_message_reads_both_payload_shapes() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        let fixed: Box<dyn std::any::Any + Send> = Box::new("bang");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "boom");
        assert_eq!(panic_message(fixed.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
