//! OS process supervision primitives.
//!
//! - [`CommandLine`] program + arguments built by a module
//! - [`Launch`] / [`OsLauncher`] the spawning seam (injectable)
//! - [`ProcessHandle`] one spawned process: pid, exit code, merged output, signals
//! - [`OutputBuffer`] merged stdout/stderr bytes captured so far
//!
//! ## Architecture
//! ```text
//! OsLauncher::launch(cmd)
//!     ├─► tokio::process::Command (stdin null, stdout+stderr piped)
//!     ├─► pump(stdout) ─┐
//!     ├─► pump(stderr) ─┴─► OutputBuffer ──► drained=true on EOF of both
//!     └─► reaper task: select { child.wait() ─► status=Some(code)
//!                               control rx  ─► SIGTERM (nix) / start_kill }
//! ```
//!
//! Handles are never reused: a relaunch always produces a new one.

mod command;
mod handle;
mod launcher;
mod output;

pub use command::CommandLine;
pub use handle::{ProcessHandle, ProcessState, Signal};
pub use launcher::{Launch, OsLauncher};
pub use output::OutputBuffer;

#[cfg(test)]
pub(crate) mod testing;
