//! # Process spawning seam.
//!
//! [`Launch`] is what executors call to start a module's command. The default
//! [`OsLauncher`] uses `tokio::process`; tests inject launchers that never
//! touch the OS.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::ProcessError;
use crate::process::{CommandLine, OutputBuffer, ProcessHandle, Signal};

/// Starts external processes.
///
/// Must be called from within a tokio runtime. Spawning itself must not block:
/// waiting for the process is the handle's job.
pub trait Launch: Send + Sync + 'static {
    /// Spawns `command` with stdin closed and stdout/stderr merged into the handle's buffer.
    fn launch(&self, command: &CommandLine) -> Result<ProcessHandle, ProcessError>;
}

/// [`Launch`] implementation backed by `tokio::process::Command`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsLauncher;

impl Launch for OsLauncher {
    fn launch(&self, command: &CommandLine) -> Result<ProcessHandle, ProcessError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| ProcessError::SpawnFailed {
                program: command.program.clone(),
                source,
            })?;

        let Some(pid) = child.id() else {
            return Err(ProcessError::MissingPid(command.program.clone()));
        };

        let output = OutputBuffer::new();
        let (drained_tx, drained_rx) = watch::channel(false);
        let pumps = [
            child.stdout.take().map(|r| pump(r, output.clone())),
            child.stderr.take().map(|r| pump(r, output.clone())),
        ];
        tokio::spawn(async move {
            for pump in pumps.into_iter().flatten() {
                let _ = pump.await;
            }
            drained_tx.send_replace(true);
        });

        let (status_tx, status_rx) = watch::channel(None);
        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        tokio::spawn(reap(child, pid, ctl_rx, status_tx));

        Ok(ProcessHandle::from_parts(
            command.clone(),
            Some(pid),
            status_rx,
            drained_rx,
            output,
            ctl_tx,
        ))
    }
}

/// Copies one pipe into the shared buffer until EOF or a read error.
fn pump<R>(mut reader: R, output: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => output.append(&chunk[..n]),
            }
        }
    })
}

/// Owns the child until it is reaped, applying signal requests meanwhile.
async fn reap(
    mut child: Child,
    pid: u32,
    mut control: mpsc::UnboundedReceiver<Signal>,
    status: watch::Sender<Option<i32>>,
) {
    let code = loop {
        let request = tokio::select! {
            res = child.wait() => break res.map(exit_code).unwrap_or(-1),
            req = control.recv() => req,
        };
        match request {
            Some(Signal::Terminate) => send_terminate(&mut child, pid),
            Some(Signal::Kill) => {
                let _ = child.start_kill();
            }
            // Every handle is gone: nobody can signal anymore, just reap.
            None => break child.wait().await.map(exit_code).unwrap_or(-1),
        }
    };
    status.send_replace(Some(code));
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: u32) {
    use nix::sys::signal::{Signal as NixSignal, kill};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    let _ = kill(Pid::from_raw(raw), NixSignal::SIGTERM);
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: u32) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
