//! # Orchestrator: owns the runtime and drives it until shutdown.
//!
//! The [`Orchestrator`] holds the execution [`Context`] (config, bus, ticker,
//! sink, launcher), the [`Routine`] and the module [`Catalog`]. `run()` wires
//! event delivery, starts time, resumes the routine and waits for an OS
//! termination signal.
//!
//! ## Architecture
//! ```text
//! run():
//!   subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   ticker.start()
//!   routine.resume()          Panel launches, Queue subscribes to the ticker
//!
//! Event flow:
//!   Ticker / Queue / Panel / executors ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                       ┌─────────┼─────────┐
//!                                                                       ▼         ▼         ▼
//!                                                                   LogWriter   sub 2  ...  sub N
//!
//! Shutdown path:
//!   wait_for_shutdown_signal()
//!       └─► publish(ShutdownRequested)
//!       └─► timeout(cfg.grace, routine.stop())
//!              ├─ Ok          → publish(AllStoppedWithin)
//!              └─ stuck/late  → publish(GraceExceeded), Err(RuntimeError::GraceExceeded)
//!       └─► ticker.stop(), listener drains and shuts the SubscriberSet down
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use netvisor::{AddOptions, Config, Orchestrator, Params, Subscribe};
//! #[cfg(feature = "logging")]
//! use netvisor::LogWriter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     #[cfg(feature = "logging")]
//!     subs.push(Arc::new(LogWriter::new()));
//!
//!     let orch = Orchestrator::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!     orch.add("fping", &Params::new(), AddOptions::hosts(["10.0.0.1", "10.0.0.2"])).await?;
//!     orch.add("arpwatch", &Params::new(), AddOptions::default()).await?;
//!
//!     orch.run().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::builder::OrchestratorBuilder;
use crate::core::shutdown;
use crate::error::{RuntimeError, ScheduleError};
use crate::events::{Bus, Event, EventKind};
use crate::modules::{Catalog, Context, ModuleInstance, Params};
use crate::schedule::{AddOptions, Routine};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Top-level runtime: routine, catalog, event delivery and graceful shutdown.
pub struct Orchestrator {
    ctx: Context,
    routine: Arc<Routine>,
    catalog: Catalog,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        ctx: Context,
        catalog: Catalog,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let routine = Arc::new(Routine::new(&ctx));
        Self {
            ctx,
            routine,
            catalog,
            subscribers,
        }
    }

    /// Execution context shared by every instance.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.ctx.bus
    }

    /// The routine (front-end operations live there).
    pub fn routine(&self) -> &Arc<Routine> {
        &self.routine
    }

    /// Known module definitions.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Creates an instance of catalog module `id`.
    pub fn instantiate(&self, id: &str, params: &Params) -> Result<Arc<ModuleInstance>, ScheduleError> {
        self.catalog.instantiate(id, params, self.ctx.clone())
    }

    /// Instantiates catalog module `id` and adds it to the routine.
    pub async fn add(
        &self,
        id: &str,
        params: &Params,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        let instance = self.instantiate(id, params)?;
        self.routine.add_module(instance, opts).await
    }

    /// Runs until SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then stops within `cfg.grace`.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.run_until(shutdown::wait_for_shutdown_signal()).await
    }

    /// Runs until `signal` completes, then stops within `cfg.grace`.
    ///
    /// An error from `signal` still triggers the shutdown and is returned afterwards.
    pub async fn run_until<F>(&self, signal: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let token = CancellationToken::new();
        let listener = self.subscriber_listener(token.clone());
        self.ctx.ticker.start();
        self.routine.resume().await;

        let received = signal.await;
        let result = self.shutdown().await;

        token.cancel();
        let _ = tokio::time::timeout(self.ctx.config.drain_bound, listener).await;
        received?;
        result
    }

    /// Forwards bus events to a fresh [`SubscriberSet`] until cancelled, then drains it.
    fn subscriber_listener(&self, token: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.ctx.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.ctx.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }

    /// Stops the routine within the grace period and halts the ticker.
    async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.ctx
            .bus
            .publish(Event::new(EventKind::ShutdownRequested));
        let grace = self.ctx.config.grace;
        let stopped = tokio::time::timeout(grace, self.routine.stop()).await;
        self.ctx.ticker.stop();

        let stuck = match stopped {
            Ok(Ok(())) => {
                self.ctx
                    .bus
                    .publish(Event::new(EventKind::AllStoppedWithin).with_timeout(grace));
                return Ok(());
            }
            Ok(Err(ScheduleError::Unterminable { set_ids })) => set_ids,
            Ok(Err(_)) | Err(_) => self.routine.live_set_ids(),
        };
        self.ctx.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_timeout(grace)
                .with_reason(stuck.join(",")),
        );
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }
}
