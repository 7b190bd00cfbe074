//! Schedulers deciding *when* module instances run.
//!
//! - [`Queue`]: active instances on per-entry countdowns driven by the ticker
//! - [`Panel`]: passive instances started and stopped together
//! - [`Routine`]: one queue + one panel, global set ids, unified pause/resume
//!
//! ## Set ids
//! Every entry gets a scheduler-local id. Without an explicit id the module id
//! is used, suffixed on collision: `scan`, `scan1`, `scan2`, ...

mod panel;
mod queue;
mod routine;
mod snapshot;

pub use panel::Panel;
pub use queue::Queue;
pub use routine::{PauseOptions, Routine, Target};
pub use snapshot::{PanelEntrySnapshot, QueueEntrySnapshot, RoutineSnapshot};

/// Options for adding an instance to a scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Initial countdown in ticks (queue only). Defaults to the module's timer.
    pub countdown: Option<u64>,
    /// Requested set id. Defaults to the module id.
    pub set_id: Option<String>,
    /// Target hosts appended to every command line.
    pub hosts: Vec<String>,
}

impl AddOptions {
    /// Options targeting `hosts`.
    pub fn hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the initial countdown.
    pub fn countdown(mut self, ticks: u64) -> Self {
        self.countdown = Some(ticks);
        self
    }

    /// Requests a set id.
    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.set_id = Some(id.into());
        self
    }
}

/// First of `base`, `base1`, `base2`, ... that `taken` rejects.
pub(crate) fn unique_set_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
