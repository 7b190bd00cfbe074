//! In-memory launcher used by unit tests across the crate.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::ProcessError;
use crate::process::{CommandLine, Launch, OutputBuffer, ProcessHandle, Signal};

/// Test-side controls of one fake process.
#[derive(Clone)]
pub(crate) struct FakeProcess {
    pub output: OutputBuffer,
    status: Arc<watch::Sender<Option<i32>>>,
    drained: Arc<watch::Sender<bool>>,
}

impl FakeProcess {
    /// Writes output and closes the pipes.
    pub fn finish_output(&self, bytes: &[u8]) {
        self.output.append(bytes);
        self.drained.send_replace(true);
    }

    /// Marks the process as reaped.
    pub fn exit(&self, code: i32) {
        self.status.send_replace(Some(code));
    }

    pub fn is_alive(&self) -> bool {
        self.status.borrow().is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Dies on the first terminate or kill.
    Obedient,
    /// Ignores every signal.
    Stubborn,
    /// Every launch fails to spawn.
    Broken,
}

/// Records every launch and hands out controllable fake processes.
pub(crate) struct FakeLauncher {
    behavior: Behavior,
    launched: Mutex<Vec<FakeProcess>>,
}

impl FakeLauncher {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            launched: Mutex::new(Vec::new()),
        })
    }

    pub fn launched(&self) -> Vec<FakeProcess> {
        self.launched.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.launched.lock().len()
    }

    pub fn alive(&self) -> usize {
        self.launched.lock().iter().filter(|p| p.is_alive()).count()
    }
}

impl Launch for FakeLauncher {
    fn launch(&self, command: &CommandLine) -> Result<ProcessHandle, ProcessError> {
        let behavior = self.behavior;
        if behavior == Behavior::Broken {
            return Err(ProcessError::SpawnFailed {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake launcher"),
            });
        }

        let (status_tx, status_rx) = watch::channel(None);
        let (drained_tx, drained_rx) = watch::channel(false);
        let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel::<Signal>();
        let fake = FakeProcess {
            output: OutputBuffer::new(),
            status: Arc::new(status_tx),
            drained: Arc::new(drained_tx),
        };

        let status = fake.status.clone();
        let drained = fake.drained.clone();
        tokio::spawn(async move {
            while let Some(sig) = ctl_rx.recv().await {
                if behavior == Behavior::Obedient {
                    let code = match sig {
                        Signal::Terminate => -15,
                        Signal::Kill => -9,
                    };
                    drained.send_replace(true);
                    status.send_replace(Some(code));
                    break;
                }
            }
        });

        let pid = 10_000 + self.launched.lock().len() as u32;
        let handle = ProcessHandle::from_parts(
            command.clone(),
            Some(pid),
            status_rx,
            drained_rx,
            fake.output.clone(),
            ctl_tx,
        );
        self.launched.lock().push(fake);
        Ok(handle)
    }
}
