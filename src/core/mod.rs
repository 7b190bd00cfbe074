//! Runtime core: orchestration and lifecycle.
//!
//! The only public API from this module is [`Orchestrator`] (and its
//! [`OrchestratorBuilder`]), which wires the event bus to subscribers, starts
//! the ticker, resumes the routine and shuts everything down within the
//! configured grace period.
//!
//! Internal modules:
//! - [`orchestrator`]: lifecycle, event delivery, graceful shutdown;
//! - [`builder`]: assembles bus, ticker, context and catalog;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod orchestrator;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use orchestrator::Orchestrator;
