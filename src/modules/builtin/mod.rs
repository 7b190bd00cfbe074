//! Modules shipped with netvisor.
//!
//! | id         | program   | archetype | default timing            |
//! |------------|-----------|-----------|---------------------------|
//! | `fping`    | fping     | Active    | timer 60, max 60          |
//! | `nmap`     | nmap      | Active    | timer 300, max 340        |
//! | `arpwatch` | tcpdump   | Passive   | read every 10 ticks       |
//!
//! [`CommandModule`] wraps any other program with line-based output.

mod arp_watch;
mod command;
mod nmap;
mod ping_sweep;

pub use arp_watch::ArpWatch;
pub use command::CommandModule;
pub use nmap::NmapDiscovery;
pub use ping_sweep::PingSweep;
