//! # Result sink: where parsed findings go.
//!
//! [`Module::parse_output`](crate::Module::parse_output) is the only producer.
//! The application's network model implements [`Sink`]; this crate ships
//! [`MemorySink`] (collects everything) and [`NullSink`] (drops everything).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One fact extracted from program output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    /// The host answered a probe.
    HostAlive {
        /// IP address.
        address: String,
    },
    /// The host was observed on the wire.
    HostSeen {
        /// IP address.
        address: String,
        /// Hardware address, when the observation carried one.
        mac: Option<String>,
    },
    /// An open port on a host.
    OpenPort {
        /// IP address.
        address: String,
        /// Port number.
        port: u16,
        /// Transport protocol (`tcp`, `udp`).
        protocol: String,
    },
    /// Raw output line for modules without a structured parser.
    Line {
        /// Line content without the trailing newline.
        line: String,
    },
}

/// Receiver of findings.
///
/// Called from supervisor tasks and from the blocking pool, so implementations
/// must be cheap and must not block for long.
pub trait Sink: Send + Sync + 'static {
    /// Accepts one finding produced by `module`.
    fn report(&self, module: &str, finding: Finding);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn report(&self, _module: &str, _finding: Finding) {}
}

/// Sink that keeps every finding in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    findings: Mutex<Vec<(String, Finding)>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies all findings collected so far.
    pub fn findings(&self) -> Vec<(String, Finding)> {
        self.findings.lock().clone()
    }

    /// Removes and returns all findings collected so far.
    pub fn take(&self) -> Vec<(String, Finding)> {
        std::mem::take(&mut *self.findings.lock())
    }

    /// Number of collected findings.
    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn report(&self, module: &str, finding: Finding) {
        self.findings.lock().push((module.to_string(), finding));
    }
}
