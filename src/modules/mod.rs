//! Modules: external programs as controllable units of work.
//!
//! ## Contents
//! - [`Module`] definition contract (scheme, command building, output parsing)
//! - [`ParamScheme`] / [`ParamSpec`] / [`Params`] parameter declaration and resolution
//! - [`ModuleInstance`] configured module + archetype executor
//! - [`Context`] collaborators injected into instances and schedulers
//! - [`Sink`] / [`Finding`] result boundary
//! - [`Catalog`] definitions by id
//! - [`builtin`] shipped modules
//!
//! ## Execution
//! ```text
//! Active:   launch_now ─► supervisor task ─► wait(max) ─► parse_output (once)
//! Passive:  launch ─► Background (process) + Communicator (ticker subscriber)
//!                                              └─► every read_interval: parse_output(buffer)
//! ```

mod active;
pub mod builtin;
mod catalog;
mod communicator;
mod context;
mod instance;
mod module;
mod params;
mod passive;
mod sink;

pub use catalog::Catalog;
pub use context::Context;
pub use instance::ModuleInstance;
pub use module::{Archetype, Module};
pub use params::{ParamKind, ParamScheme, ParamSpec, Params, is_truthy};
pub use sink::{Finding, MemorySink, NullSink, Sink};
