//! # LogWriter: tracing-backed event logger
//!
//! A subscriber that turns incoming [`Event`]s into `tracing` records under the
//! `netvisor` target. Install any `tracing` subscriber (e.g. `tracing-subscriber`'s
//! `fmt`) to see them.
//!
//! ## Levels
//! - `error`: launch failures, unterminable workers, subscriber panics
//! - `warn`: timeouts, non-zero exits, overruns, stuck readers, grace exceeded
//! - `info`: launches, scheduler state changes, shutdown
//! - `debug`: output deliveries, entry firing and membership

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let module = e.module.as_deref().unwrap_or("-");
        let set_id = e.set_id.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SubscriberPanicked => {
                error!(target: "netvisor", subscriber = module, info = reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "netvisor", subscriber = module, reason, "subscriber dropped event");
            }
            EventKind::TickerStarted => info!(target: "netvisor", "ticker started"),
            EventKind::TickerAlreadyRunning => {
                debug!(target: "netvisor", "ticker already running")
            }
            EventKind::TickerStopped => info!(target: "netvisor", "ticker stopped"),
            EventKind::DecrementPanicked => {
                error!(target: "netvisor", info = reason, "ticker subscriber panicked")
            }
            EventKind::ModuleLaunched => {
                info!(target: "netvisor", module, pid = ?e.pid, command = reason, "module launched");
            }
            EventKind::ModuleExited => match e.exit_code {
                Some(0) => {
                    info!(target: "netvisor", module, bytes = ?e.bytes, "module exited");
                }
                code => {
                    warn!(target: "netvisor", module, exit_code = ?code, bytes = ?e.bytes, "module exited abnormally");
                }
            },
            EventKind::ModuleTimedOut => {
                warn!(target: "netvisor", module, pid = ?e.pid, timeout_ms = ?e.timeout_ms, "module exceeded its maximum duration");
            }
            EventKind::LaunchFailed => {
                error!(target: "netvisor", module, error = reason, "module launch failed");
            }
            EventKind::PipeUnavailable => {
                error!(target: "netvisor", module, attempts = ?e.attempt, "module output never became available");
            }
            EventKind::OutputDelivered => {
                debug!(target: "netvisor", module, bytes = ?e.bytes, "output delivered");
            }
            EventKind::ReadOverrun => {
                warn!(target: "netvisor", module, "output read overran its interval");
            }
            EventKind::ReaderStuck => {
                warn!(target: "netvisor", module, bound_ms = ?e.timeout_ms, "output reader still alive after join bound");
            }
            EventKind::InterruptRequested => {
                debug!(target: "netvisor", module, attempt = ?e.attempt, "interrupting workers");
            }
            EventKind::InterruptFailed => {
                error!(target: "netvisor", module, attempts = ?e.attempt, "workers survived interruption");
            }
            EventKind::EntryAdded => {
                debug!(target: "netvisor", module, set_id, scheduler = reason, "entry added");
            }
            EventKind::EntryRejected => {
                warn!(target: "netvisor", module, error = reason, "entry rejected");
            }
            EventKind::EntryRemoved => debug!(target: "netvisor", set_id, "entry removed"),
            EventKind::EntryFired => debug!(target: "netvisor", module, set_id, "entry fired"),
            EventKind::SchedulerResumed => info!(target: "netvisor", scheduler = reason, "resumed"),
            EventKind::SchedulerPaused => info!(target: "netvisor", scheduler = reason, "paused"),
            EventKind::ShutdownRequested => info!(target: "netvisor", "shutdown requested"),
            EventKind::AllStoppedWithin => {
                info!(target: "netvisor", "all modules stopped within grace")
            }
            EventKind::GraceExceeded => {
                warn!(target: "netvisor", stuck = reason, grace_ms = ?e.timeout_ms, "grace period exceeded")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
