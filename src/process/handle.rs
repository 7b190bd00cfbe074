//! # Handle to one spawned OS process.
//!
//! The `Child` itself is owned by a reaper task (see [`OsLauncher`](super::OsLauncher));
//! the handle talks to it through two channels:
//! - a `watch` carrying `None` while running and `Some(code)` once reaped
//! - an unbounded control channel carrying [`Signal`] requests
//!
//! Output is pumped into an [`OutputBuffer`]; a second `watch` flips to `true`
//! once both pipes reached EOF.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::process::{CommandLine, OutputBuffer};

/// Signal requests forwarded to the reaper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Polite termination (SIGTERM on unix).
    Terminate,
    /// Forced kill (SIGKILL).
    Kill,
}

/// Observable process state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Still alive.
    Running {
        /// OS process id, if known.
        pid: Option<u32>,
    },
    /// Reaped with the given exit code (`-N` when killed by signal `N`).
    Exited {
        /// Exit code.
        code: i32,
    },
}

/// One spawned external process.
#[derive(Debug)]
pub struct ProcessHandle {
    command: CommandLine,
    pid: Option<u32>,
    status: watch::Receiver<Option<i32>>,
    drained: watch::Receiver<bool>,
    output: OutputBuffer,
    control: mpsc::UnboundedSender<Signal>,
}

impl ProcessHandle {
    pub(crate) fn from_parts(
        command: CommandLine,
        pid: Option<u32>,
        status: watch::Receiver<Option<i32>>,
        drained: watch::Receiver<bool>,
        output: OutputBuffer,
        control: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self {
            command,
            pid,
            status,
            drained,
            output,
            control,
        }
    }

    /// The command this process was started with.
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// OS process id.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit code if the process has been reaped.
    pub fn exit_code(&self) -> Option<i32> {
        *self.status.borrow()
    }

    /// Whether the process has not been reaped yet.
    pub fn is_alive(&self) -> bool {
        self.exit_code().is_none()
    }

    /// Current state.
    pub fn state(&self) -> ProcessState {
        match self.exit_code() {
            Some(code) => ProcessState::Exited { code },
            None => ProcessState::Running { pid: self.pid },
        }
    }

    /// Captured output (shared with the pipe pumps).
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Whether both pipes reached EOF.
    pub fn is_drained(&self) -> bool {
        *self.drained.borrow()
    }

    /// Waits for the exit code, up to `limit` (`None` waits forever).
    ///
    /// Returns `None` if the process is still alive when the limit expires.
    pub async fn wait(&self, limit: Option<Duration>) -> Option<i32> {
        let mut rx = self.status.clone();
        let exited = async move {
            // A closed channel means the reaper is gone; its last value stands.
            let _ = rx.wait_for(Option::is_some).await;
            *rx.borrow()
        };
        match limit {
            Some(limit) => tokio::time::timeout(limit, exited).await.ok().flatten(),
            None => exited.await,
        }
    }

    /// Requests polite termination.
    pub fn terminate(&self) {
        let _ = self.control.send(Signal::Terminate);
    }

    /// Requests a forced kill.
    pub fn kill(&self) {
        let _ = self.control.send(Signal::Kill);
    }

    /// Terminate, wait `grace`, kill, wait `grace`.
    ///
    /// Returns whether the process is gone afterwards.
    pub async fn interrupt(&self, grace: Duration) -> bool {
        if !self.is_alive() {
            return true;
        }
        self.terminate();
        if self.wait(Some(grace)).await.is_some() {
            return true;
        }
        self.kill();
        self.wait(Some(grace)).await.is_some()
    }

    /// Waits up to `bound` for both pipes to close, then drains the buffer.
    ///
    /// Whatever was captured is returned even when the bound expires.
    pub async fn read_to_end(&self, bound: Duration) -> Vec<u8> {
        let mut rx = self.drained.clone();
        let _ = tokio::time::timeout(bound, rx.wait_for(|done| *done)).await;
        self.output.take()
    }
}
