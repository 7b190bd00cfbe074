//! # Active execution: one supervisor task per run.
//!
//! ```text
//! launch(hosts)  (sync, safe inside a tick)
//!   ├─► purge finished supervisors
//!   ├─► register Supervisor
//!   └─► tokio::spawn(supervise):
//!         launcher.launch(cmd) ──Err──► Outcome::Failed
//!               │Ok
//!               ▼
//!         handle.wait(max_duration) ──Some(code)──► Outcome::Exited(code)
//!               │None
//!               ▼
//!         Outcome::TimedOut(max)      (process keeps running)
//!               │
//!               ▼
//!         report(outcome): Exited → read_to_end(drain_bound) → parse_output
//!                          TimedOut → event, output closed (process keeps running)
//!                          Failed   → event only
//! ```
//!
//! `stop()` interrupts every registered process once (terminate, then kill
//! after `term_grace`); there is no retry at this layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::ProcessError;
use crate::events::{Event, EventKind};
use crate::modules::{Context, Module};
use crate::process::{CommandLine, ProcessHandle};

/// Result of one active run.
#[derive(Debug)]
enum Outcome {
    /// The process exited with this code.
    Exited(i32),
    /// The process outlived its maximum duration.
    TimedOut(Duration),
    /// The process could not be started.
    Failed(ProcessError),
}

/// Bookkeeping of one run.
#[derive(Default)]
struct Supervisor {
    handle: Mutex<Option<Arc<ProcessHandle>>>,
    finished: AtomicBool,
    cancelled: AtomicBool,
}

impl Supervisor {
    fn is_live(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
            || self.handle.lock().as_ref().is_some_and(|h| h.is_alive())
    }

    fn handle(&self) -> Option<Arc<ProcessHandle>> {
        self.handle.lock().clone()
    }
}

/// Marks the supervisor finished even if result handling panics.
struct FinishGuard(Arc<Supervisor>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finished.store(true, Ordering::SeqCst);
    }
}

/// Supervisor registry of one active instance.
#[derive(Default)]
pub(crate) struct ActiveExecutor {
    supervisors: Mutex<Vec<Arc<Supervisor>>>,
}

impl ActiveExecutor {
    /// Starts one run without waiting for it.
    pub(crate) fn launch(
        &self,
        module: Arc<dyn Module>,
        command: CommandLine,
        hosts: Vec<String>,
        ctx: Context,
    ) {
        let supervisor = Arc::new(Supervisor::default());
        {
            let mut sups = self.supervisors.lock();
            sups.retain(|s| s.is_live());
            sups.push(Arc::clone(&supervisor));
        }
        tokio::spawn(supervise(supervisor, module, command, hosts, ctx));
    }

    /// Interrupts every registered process once.
    pub(crate) async fn stop(&self, module: &str, ctx: &Context) {
        let sups: Vec<Arc<Supervisor>> = self.supervisors.lock().clone();
        for sup in &sups {
            sup.cancelled.store(true, Ordering::SeqCst);
            let Some(handle) = sup.handle() else {
                continue;
            };
            if !handle.is_alive() {
                continue;
            }
            let mut ev = Event::new(EventKind::InterruptRequested)
                .with_module(module)
                .with_attempt(1);
            if let Some(pid) = handle.pid() {
                ev = ev.with_pid(pid);
            }
            ctx.bus.publish(ev);
            if !handle.interrupt(ctx.config.term_grace).await {
                ctx.bus.publish(
                    Event::new(EventKind::InterruptFailed)
                        .with_module(module)
                        .with_reason(handle.command().to_string()),
                );
            }
        }
        self.supervisors.lock().retain(|s| s.is_live());
    }

    /// Runs still in flight plus timed-out processes still alive.
    pub(crate) fn live(&self) -> usize {
        self.supervisors.lock().iter().filter(|s| s.is_live()).count()
    }

    /// Handles of every registered run that got a process.
    pub(crate) fn processes(&self) -> Vec<Arc<ProcessHandle>> {
        self.supervisors
            .lock()
            .iter()
            .filter_map(|s| s.handle())
            .collect()
    }
}

async fn supervise(
    supervisor: Arc<Supervisor>,
    module: Arc<dyn Module>,
    command: CommandLine,
    hosts: Vec<String>,
    ctx: Context,
) {
    let _finish = FinishGuard(Arc::clone(&supervisor));
    let max = ctx.config.ticks(module.max_duration());

    let handle = match ctx.launcher.launch(&command) {
        Ok(handle) => Arc::new(handle),
        Err(err) => {
            report(module.as_ref(), &ctx, &hosts, None, Outcome::Failed(err)).await;
            return;
        }
    };
    *supervisor.handle.lock() = Some(Arc::clone(&handle));
    if supervisor.cancelled.load(Ordering::SeqCst) {
        handle.kill();
    }

    let mut ev = Event::new(EventKind::ModuleLaunched)
        .with_module(module.id())
        .with_reason(command.to_string());
    if let Some(pid) = handle.pid() {
        ev = ev.with_pid(pid);
    }
    ctx.bus.publish(ev);

    let outcome = match handle.wait(Some(max)).await {
        Some(code) => Outcome::Exited(code),
        None => Outcome::TimedOut(max),
    };
    report(module.as_ref(), &ctx, &hosts, Some(&*handle), outcome).await;
}

/// Result callback of one run.
async fn report(
    module: &dyn Module,
    ctx: &Context,
    hosts: &[String],
    handle: Option<&ProcessHandle>,
    outcome: Outcome,
) {
    match (outcome, handle) {
        (Outcome::Exited(code), Some(handle)) => {
            let raw = handle.read_to_end(ctx.config.drain_bound).await;
            ctx.bus.publish(
                Event::new(EventKind::ModuleExited)
                    .with_module(module.id())
                    .with_exit_code(code)
                    .with_bytes(raw.len()),
            );
            module.parse_output(&raw, hosts, ctx.sink.as_ref());
        }
        (Outcome::TimedOut(limit), handle) => {
            let mut ev = Event::new(EventKind::ModuleTimedOut)
                .with_module(module.id())
                .with_timeout(limit);
            if let Some(pid) = handle.and_then(ProcessHandle::pid) {
                ev = ev.with_pid(pid);
            }
            ctx.bus.publish(ev);
            // nobody parses this run any more
            if let Some(handle) = handle {
                handle.output().close();
            }
        }
        (Outcome::Failed(err), _) => {
            ctx.bus.publish(
                Event::new(EventKind::LaunchFailed)
                    .with_module(module.id())
                    .with_reason(err.to_string()),
            );
        }
        (Outcome::Exited(code), None) => {
            ctx.bus.publish(
                Event::new(EventKind::ModuleExited)
                    .with_module(module.id())
                    .with_exit_code(code),
            );
        }
    }
}
