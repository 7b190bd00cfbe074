//! # Passive execution: background process + communicator pairs.
//!
//! ## Launch
//! ```text
//! purge finished pairs
//! Background::start(cmd)  ── spawn task ──► launcher.launch(cmd) ─► slot
//! poll slot with cfg.spawn_wait:
//!     Ready(handle) ─► Communicator::new(handle.output) ─► ticker.subscribe ─► register pair
//!     Failed(err)   ─► LaunchFailed,     Err(ModuleError::Spawn)
//!     exhausted     ─► Background::interrupt, PipeUnavailable, Err(ModuleError::PipeUnavailable)
//! ```
//!
//! ## Stop
//! Producers before consumers: every attempt interrupts all backgrounds
//! (terminate, kill) and then all communicators. Attempts repeat with
//! `cfg.interrupt` backoff while any background is alive; once the policy is
//! spent the stop fails with `ModuleError::Unterminable`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{ModuleError, ProcessError};
use crate::events::{Event, EventKind};
use crate::modules::communicator::Communicator;
use crate::modules::{Context, Module};
use crate::process::{CommandLine, ProcessHandle, ProcessState};

enum Spawn {
    Pending,
    Ready(Arc<ProcessHandle>),
    Failed(ProcessError),
}

/// Long-running process started on its own task; never waits for exit.
struct Background {
    spawn: Mutex<Spawn>,
    cancelled: AtomicBool,
}

impl Background {
    fn start(command: CommandLine, ctx: &Context) -> Arc<Self> {
        let bg = Arc::new(Self {
            spawn: Mutex::new(Spawn::Pending),
            cancelled: AtomicBool::new(false),
        });
        let this = Arc::clone(&bg);
        let launcher = Arc::clone(&ctx.launcher);
        tokio::spawn(async move {
            let next = match launcher.launch(&command) {
                Ok(handle) => {
                    let handle = Arc::new(handle);
                    if this.cancelled.load(Ordering::SeqCst) {
                        handle.kill();
                    }
                    Spawn::Ready(handle)
                }
                Err(err) => Spawn::Failed(err),
            };
            *this.spawn.lock() = next;
        });
        bg
    }

    fn handle(&self) -> Option<Arc<ProcessHandle>> {
        match &*self.spawn.lock() {
            Spawn::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Takes the spawn error, if the spawn failed.
    fn take_error(&self) -> Option<ProcessError> {
        let mut spawn = self.spawn.lock();
        match std::mem::replace(&mut *spawn, Spawn::Pending) {
            Spawn::Failed(err) => Some(err),
            other => {
                *spawn = other;
                None
            }
        }
    }

    fn is_alive(&self) -> bool {
        match &*self.spawn.lock() {
            Spawn::Ready(handle) => matches!(handle.state(), ProcessState::Running { .. }),
            Spawn::Pending => !self.cancelled.load(Ordering::SeqCst),
            Spawn::Failed(_) => false,
        }
    }

    async fn interrupt(&self, grace: Duration) -> bool {
        self.cancelled.store(true, Ordering::SeqCst);
        match self.handle() {
            Some(handle) => handle.interrupt(grace).await,
            None => true,
        }
    }
}

#[derive(Clone)]
struct Pair {
    background: Arc<Background>,
    communicator: Arc<Communicator>,
}

impl Pair {
    fn is_live(&self) -> bool {
        self.background.is_alive() || self.communicator.is_active()
    }
}

/// Pair registry of one passive instance.
#[derive(Default)]
pub(crate) struct PassiveExecutor {
    pairs: Mutex<Vec<Pair>>,
}

impl PassiveExecutor {
    /// Starts one background/communicator pair.
    pub(crate) async fn launch(
        &self,
        module: Arc<dyn Module>,
        command: CommandLine,
        hosts: Vec<String>,
        ctx: &Context,
    ) -> Result<(), ModuleError> {
        self.purge().await;

        let background = Background::start(command.clone(), ctx);
        let policy = ctx.config.spawn_wait;
        let mut handle = None;
        for attempt in 0..policy.max_attempts() {
            if let Some(h) = background.handle() {
                handle = Some(h);
                break;
            }
            if let Some(err) = background.take_error() {
                ctx.bus.publish(
                    Event::new(EventKind::LaunchFailed)
                        .with_module(module.id())
                        .with_reason(err.to_string()),
                );
                return Err(ModuleError::Spawn(err));
            }
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }

        let Some(handle) = handle else {
            background.interrupt(ctx.config.term_grace).await;
            ctx.bus.publish(
                Event::new(EventKind::PipeUnavailable)
                    .with_module(module.id())
                    .with_attempt(policy.max_attempts()),
            );
            return Err(ModuleError::PipeUnavailable {
                module: module.id().to_string(),
                attempts: policy.max_attempts(),
            });
        };

        let mut ev = Event::new(EventKind::ModuleLaunched)
            .with_module(module.id())
            .with_reason(command.to_string());
        if let Some(pid) = handle.pid() {
            ev = ev.with_pid(pid);
        }
        ctx.bus.publish(ev);

        let communicator = Communicator::new(module, ctx.clone(), hosts, handle.output().clone());
        communicator.start();
        self.pairs.lock().push(Pair {
            background,
            communicator,
        });
        Ok(())
    }

    /// Interrupts every pair, retrying while backgrounds survive.
    pub(crate) async fn stop(&self, module: &str, ctx: &Context) -> Result<(), ModuleError> {
        let pairs: Vec<Pair> = self.pairs.lock().clone();
        if pairs.is_empty() {
            return Ok(());
        }

        let policy = ctx.config.interrupt;
        let grace = ctx.config.term_grace;
        let mut live = 0;
        for attempt in 0..policy.max_attempts() {
            ctx.bus.publish(
                Event::new(EventKind::InterruptRequested)
                    .with_module(module)
                    .with_attempt(attempt + 1),
            );
            for pair in &pairs {
                pair.background.interrupt(grace).await;
            }
            for pair in &pairs {
                pair.communicator.interrupt().await;
            }

            live = pairs.iter().filter(|p| p.background.is_alive()).count();
            if live == 0 {
                self.pairs.lock().retain(|p| p.is_live());
                return Ok(());
            }
            if attempt + 1 < policy.max_attempts() {
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
        }

        ctx.bus.publish(
            Event::new(EventKind::InterruptFailed)
                .with_module(module)
                .with_attempt(policy.max_attempts())
                .with_reason(format!("{live} workers alive")),
        );
        Err(ModuleError::Unterminable {
            module: module.to_string(),
            live,
        })
    }

    /// Pairs whose process or reader is still alive.
    pub(crate) fn live(&self) -> usize {
        self.pairs.lock().iter().filter(|p| p.is_live()).count()
    }

    /// Handles of every registered background process.
    pub(crate) fn processes(&self) -> Vec<Arc<ProcessHandle>> {
        self.pairs
            .lock()
            .iter()
            .filter_map(|p| p.background.handle())
            .collect()
    }

    /// Drops pairs whose process exited, detaching their communicators first.
    async fn purge(&self) {
        let finished: Vec<Pair> = {
            let mut pairs = self.pairs.lock();
            let (done, alive): (Vec<Pair>, Vec<Pair>) =
                pairs.drain(..).partition(|p| !p.background.is_alive());
            *pairs = alive;
            done
        };
        for pair in finished {
            pair.communicator.interrupt().await;
        }
    }
}
