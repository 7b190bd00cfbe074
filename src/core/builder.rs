use std::sync::Arc;

use crate::config::Config;
use crate::core::Orchestrator;
use crate::events::Bus;
use crate::modules::{Catalog, Context, NullSink, Sink};
use crate::process::{Launch, OsLauncher};
use crate::subscribers::Subscribe;

/// Builder for an [`Orchestrator`].
///
/// Defaults: no subscribers, findings discarded ([`NullSink`]), real OS
/// processes ([`OsLauncher`]) and the built-in module catalog.
pub struct OrchestratorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    sink: Arc<dyn Sink>,
    launcher: Arc<dyn Launch>,
    catalog: Catalog,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            sink: Arc::new(NullSink),
            launcher: Arc::new(OsLauncher),
            catalog: Catalog::with_builtins(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues while the orchestrator runs.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the destination of parsed findings.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the process launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launch>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Replaces the module catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Builds the orchestrator: bus, ticker, context and an empty routine.
    ///
    /// Nothing is spawned until [`Orchestrator::run`].
    pub fn build(self) -> Orchestrator {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let ctx = Context::new(self.cfg, bus, self.sink, self.launcher);
        Orchestrator::new_internal(ctx, self.catalog, self.subscribers)
    }
}
