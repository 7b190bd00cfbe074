//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the ticker, the schedulers,
//! module executors, output communicators and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Ticker`, `Queue`, `Panel`, `Routine`, module executors,
//!   `Communicator`, `Orchestrator`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Orchestrator::subscriber_listener()` (fans out to
//!   `SubscriberSet`), or any receiver obtained with [`Bus::subscribe`].
//!
//! The bus is the only logging channel: every component receives a clone at
//! construction time instead of reaching for a global logger.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub(crate) use event::panic_message;
