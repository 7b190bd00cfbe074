//! # Execution context shared by every module instance.

use std::sync::Arc;

use crate::config::Config;
use crate::events::Bus;
use crate::modules::{NullSink, Sink};
use crate::process::{Launch, OsLauncher};
use crate::ticker::Ticker;

/// Collaborators handed to instances and schedulers at construction time.
///
/// Cloning is cheap; all clones share the same bus, ticker, sink and launcher.
#[derive(Clone)]
pub struct Context {
    /// Runtime bounds and policies.
    pub config: Arc<Config>,
    /// Event bus (the only logging channel).
    pub bus: Bus,
    /// Shared ticker driving queues and communicators.
    pub ticker: Ticker,
    /// Destination of parsed findings.
    pub sink: Arc<dyn Sink>,
    /// Process spawner.
    pub launcher: Arc<dyn Launch>,
}

impl Context {
    /// Assembles a context from explicit parts.
    pub fn new(
        config: Config,
        bus: Bus,
        sink: Arc<dyn Sink>,
        launcher: Arc<dyn Launch>,
    ) -> Self {
        let ticker = Ticker::new(config.tick, bus.clone());
        Self {
            config: Arc::new(config),
            bus,
            ticker,
            sink,
            launcher,
        }
    }

    /// Context with a fresh bus, [`NullSink`] and [`OsLauncher`].
    pub fn with_defaults(config: Config) -> Self {
        let bus = Bus::new(config.bus_capacity_clamped());
        Self::new(config, bus, Arc::new(NullSink), Arc::new(OsLauncher))
    }
}
