//! Serializable scheduler state.
//!
//! Enough to rebuild equivalent entries through a [`Catalog`](crate::Catalog):
//! module id, set id, parameters, hosts and timing.

use serde::{Deserialize, Serialize};

use crate::modules::Params;

/// One queue entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntrySnapshot {
    /// Module id.
    pub module: String,
    /// Set id.
    pub set_id: String,
    /// Resolved parameters.
    pub params: Params,
    /// Target hosts.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Ticks left before the next launch.
    pub countdown: u64,
    /// Countdown restored after each launch.
    pub initial: u64,
}

/// One panel entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelEntrySnapshot {
    /// Module id.
    pub module: String,
    /// Set id.
    pub set_id: String,
    /// Resolved parameters.
    pub params: Params,
    /// Target hosts.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Output polling interval in ticks.
    pub read_interval: u64,
}

/// Whole routine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineSnapshot {
    /// Queue entries in countdown order.
    #[serde(default)]
    pub queue: Vec<QueueEntrySnapshot>,
    /// Panel entries in insertion order.
    #[serde(default)]
    pub panel: Vec<PanelEntrySnapshot>,
}
