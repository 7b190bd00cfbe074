//! Error types used by the netvisor runtime, schedulers and modules.
//!
//! This module defines four enums:
//!
//! - [`RuntimeError`]: errors raised by the [`Orchestrator`](crate::Orchestrator) itself.
//! - [`ScheduleError`]: configuration errors rejected by the Queue, Panel or Routine.
//! - [`ModuleError`]: errors raised while configuring or executing one module.
//! - [`ProcessError`]: failures to spawn an OS child process.
//!
//! All of them provide `as_label` (stable snake_case, for logs and metrics).

use std::time::Duration;
use thiserror::Error;

use crate::modules::Archetype;

/// # Errors produced by the orchestration runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some modules were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Set ids of the members that still had live workers.
        stuck: Vec<String>,
    },

    /// Registering the OS signal listeners failed.
    #[error("signal handler registration failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use netvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Configuration errors rejected by a scheduler.
///
/// These are raised synchronously by the call that would have caused them;
/// the scheduler is left unchanged.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// The module archetype does not belong to this scheduler.
    #[error("module {module:?} is {found:?}, scheduler accepts {expected:?}")]
    ArchetypeMismatch {
        /// Module id.
        module: String,
        /// Archetype accepted by the scheduler.
        expected: Archetype,
        /// Archetype of the rejected module.
        found: Archetype,
    },

    /// This very instance is already scheduled.
    #[error("module instance {module:?} is already scheduled as {set_id:?}")]
    DuplicateModule {
        /// Module id.
        module: String,
        /// Set id of the existing entry.
        set_id: String,
    },

    /// An explicitly requested set id is already taken.
    #[error("set id {0:?} is already taken")]
    DuplicateSetId(String),

    /// No entry with this set id.
    #[error("no entry with set id {0:?}")]
    UnknownSetId(String),

    /// The catalog has no module with this id.
    #[error("no module {0:?} in catalog")]
    UnknownModule(String),

    /// A module operation failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Some members kept live workers after every interruption attempt.
    #[error("could not terminate: {set_ids:?}")]
    Unterminable {
        /// Set ids of the members that are still alive.
        set_ids: Vec<String>,
    },
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::ArchetypeMismatch { .. } => "schedule_archetype_mismatch",
            ScheduleError::DuplicateModule { .. } => "schedule_duplicate_module",
            ScheduleError::DuplicateSetId(_) => "schedule_duplicate_set_id",
            ScheduleError::UnknownSetId(_) => "schedule_unknown_set_id",
            ScheduleError::UnknownModule(_) => "schedule_unknown_module",
            ScheduleError::Module(e) => e.as_label(),
            ScheduleError::Unterminable { .. } => "schedule_unterminable",
        }
    }
}

/// # Errors produced by module configuration and execution.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A parameter code has no entry in the module's scheme.
    #[error("module {module:?} has no parameter {code:?}")]
    UnknownParam {
        /// Module id.
        module: String,
        /// Offending parameter code.
        code: String,
    },

    /// A mandatory parameter has neither a value nor a default.
    #[error("module {module:?} requires parameter {code:?}")]
    MissingParam {
        /// Module id.
        module: String,
        /// Missing parameter code.
        code: String,
    },

    /// The OS process could not be spawned.
    #[error(transparent)]
    Spawn(#[from] ProcessError),

    /// A passive process never exposed its output within the spawn wait.
    #[error("module {module:?}: output not available after {attempts} attempts")]
    PipeUnavailable {
        /// Module id.
        module: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// A one-shot launch was requested on a passive module.
    #[error("module {0:?} is not active")]
    NotActive(String),

    /// Workers survived every interruption attempt.
    #[error("module {module:?}: {live} workers still alive after interruption")]
    Unterminable {
        /// Module id.
        module: String,
        /// Number of workers still alive.
        live: usize,
    },
}

impl ModuleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use netvisor::ModuleError;
    ///
    /// let err = ModuleError::NotActive("arpwatch".into());
    /// assert_eq!(err.as_label(), "module_not_active");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ModuleError::UnknownParam { .. } => "module_unknown_param",
            ModuleError::MissingParam { .. } => "module_missing_param",
            ModuleError::Spawn(_) => "module_spawn",
            ModuleError::PipeUnavailable { .. } => "module_pipe_unavailable",
            ModuleError::NotActive(_) => "module_not_active",
            ModuleError::Unterminable { .. } => "module_unterminable",
        }
    }
}

/// # Errors produced while spawning an OS process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started (not found, permission denied, ...).
    #[error("failed to spawn {program:?}: {source}")]
    SpawnFailed {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process started but the OS did not report a pid.
    #[error("spawned {0:?} without a pid")]
    MissingPid(String),
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::SpawnFailed { .. } => "process_spawn_failed",
            ProcessError::MissingPid(_) => "process_missing_pid",
        }
    }
}
