//! # Event subscribers for the netvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the fan-out coordinator
//! [`SubscriberSet`] and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Queue / Panel / Executors ── publish(Event) ──► Bus ──► Orchestrator listener
//!                                                               │
//!                                                               ▼
//!                                                         SubscriberSet
//!                                                   ┌─────────┬─────────┐
//!                                                   ▼         ▼         ▼
//!                                               LogWriter   Alerts    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use netvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct TimeoutCounter;
//!
//! #[async_trait]
//! impl Subscribe for TimeoutCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if matches!(event.kind, EventKind::ModuleTimedOut) {
//!             // increment a counter
//!         }
//!     }
//! }
//! ```

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
