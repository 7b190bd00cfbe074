//! # netvisor
//!
//! **Netvisor** supervises external network scanners (`fping`, `nmap`,
//! `tcpdump`, any command line) as scheduled *modules*.
//!
//! Two kinds of modules exist:
//! - **Active** modules run to completion: launched periodically, their whole
//!   output is parsed once the process exits.
//! - **Passive** modules run continuously: launched once, their output is
//!   polled every few ticks while they keep running.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!      ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!      │   Module    │      │   Module    │      │   Module    │
//!      │ (PingSweep) │      │   (Nmap)    │      │ (ArpWatch)  │
//!      └──────┬──────┘      └──────┬──────┘      └──────┬──────┘
//!             ▼                    ▼                    ▼
//!      ModuleInstance       ModuleInstance       ModuleInstance
//!      (params, Active)     (params, Active)     (params, Passive)
//!             │                    │                    │
//!             └─────────┬──────────┘                    │
//!                       ▼                               ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Routine                                                          │
//! │   Queue  (per-entry countdowns, fires at 0)                      │
//! │   Panel  (launch all / stop all)                                 │
//! └───────┬───────────────────────────────────────────────┬──────────┘
//!         │ Decrement                                     │ launch
//!         ▼                                               ▼
//!   Ticker (one period)  ◄── Decrement ──  Communicator  + Background process
//!                                          (reads output every N ticks)
//!
//! Every component ── publish(Event) ──► Bus ──► Orchestrator listener ──► SubscriberSet
//!                                                                         (LogWriter, ...)
//! Parsed output ──► Sink::report(module, Finding)
//! ```
//!
//! ### Lifecycle of an active run
//! ```text
//! Queue countdown hits 0
//!   ├─► reset countdown, publish EntryFired
//!   ├─► launch_now(hosts)        spawn OS process, publish ModuleLaunched
//!   └─► supervisor task
//!         ├─ exited     ─► drain output, publish ModuleExited, parse_output()
//!         ├─ max time   ─► publish ModuleTimedOut (process left running)
//!         └─ spawn err  ─► publish LaunchFailed
//! ```
//!
//! ### Lifecycle of a passive run
//! ```text
//! Panel resume
//!   ├─► background launch        poll spawn_wait until the output is ready
//!   │      └─ exhausted ─► PipeUnavailable
//!   └─► Communicator on the ticker
//!         every read_interval ticks: take output ─► OutputDelivered ─► parse_output()
//! Panel pause(kill)
//!   └─► per attempt: terminate → kill → interrupt communicators
//!         └─ still alive after all attempts ─► InterruptFailed, Unterminable
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types                          |
//! |-----------------|--------------------------------------------------------------|------------------------------------|
//! | **Modules**     | Parameter schemes, command building and output parsing.      | [`Module`], [`ParamScheme`]        |
//! | **Schedulers**  | Tick-driven queue and continuous panel behind one routine.   | [`Queue`], [`Panel`], [`Routine`]  |
//! | **Processes**   | Spawn, signal, capture output of OS processes.               | [`Launch`], [`ProcessHandle`]      |
//! | **Events**      | Structured runtime events on a broadcast bus.                | [`Event`], [`EventKind`]           |
//! | **Subscribers** | Pluggable event consumers with isolated queues.              | [`Subscribe`], [`SubscriberSet`]   |
//! | **Findings**    | Parsed scan results delivered to a sink.                     | [`Finding`], [`Sink`]              |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a `tracing`-backed subscriber (enabled by default).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netvisor::{AddOptions, Config, MemorySink, Orchestrator, Params};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let findings = Arc::new(MemorySink::new());
//!     let orch = Orchestrator::builder(Config::default())
//!         .with_sink(findings.clone())
//!         .build();
//!
//!     orch.add("fping", &Params::new(), AddOptions::hosts(["192.168.1.1"])).await?;
//!     orch.run().await?;
//!
//!     for (module, finding) in findings.take() {
//!         println!("{module}: {finding:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod modules;
mod policies;
mod process;
mod schedule;
mod subscribers;
mod ticker;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{Orchestrator, OrchestratorBuilder};
pub use error::{ModuleError, ProcessError, RuntimeError, ScheduleError};
pub use events::{Bus, Event, EventKind};
pub use modules::builtin::{ArpWatch, CommandModule, NmapDiscovery, PingSweep};
pub use modules::{
    Archetype, Catalog, Context, Finding, MemorySink, Module, ModuleInstance, NullSink,
    ParamKind, ParamScheme, ParamSpec, Params, Sink, is_truthy,
};
pub use policies::{BackoffPolicy, RetryPolicy};
pub use process::{CommandLine, Launch, OsLauncher, OutputBuffer, ProcessHandle, ProcessState, Signal};
pub use schedule::{
    AddOptions, Panel, PanelEntrySnapshot, PauseOptions, Queue, QueueEntrySnapshot, Routine,
    RoutineSnapshot, Target,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use ticker::{Decrement, Ticker};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
