//! # Module contract.
//!
//! A [`Module`] describes one external program: how to build its command line
//! and how to turn its output into [`Finding`](crate::Finding)s. It carries no
//! runtime state; that lives in [`ModuleInstance`](crate::ModuleInstance).

use serde::{Deserialize, Serialize};

use crate::modules::{ParamScheme, Params, Sink};
use crate::process::CommandLine;

/// Execution archetype of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Runs to completion and reports once; scheduled by the `Queue`.
    Active,
    /// Runs until interrupted and is polled for output; scheduled by the `Panel`.
    Passive,
}

/// Definition of an external program driven by netvisor.
///
/// All timing values are expressed in ticks (see [`Config::tick`](crate::Config::tick)).
///
/// # Example
/// ```
/// use netvisor::{Archetype, Finding, Module, ParamScheme, ParamSpec, Sink};
///
/// struct Uptime {
///     scheme: ParamScheme,
/// }
///
/// impl Module for Uptime {
///     fn id(&self) -> &str { "uptime" }
///     fn archetype(&self) -> Archetype { Archetype::Active }
///     fn program(&self) -> &str { "uptime" }
///     fn scheme(&self) -> &ParamScheme { &self.scheme }
///     fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
///         let line = String::from_utf8_lossy(raw).trim().to_string();
///         sink.report(self.id(), Finding::Line { line });
///     }
/// }
///
/// let m = Uptime { scheme: ParamScheme::new().with(ParamSpec::flag("pretty", "-p").default_value("on")) };
/// let params = m.scheme().resolve(m.id(), &Default::default()).unwrap();
/// assert_eq!(m.build_command(&params, &[]).to_string(), "uptime -p");
/// ```
pub trait Module: Send + Sync + 'static {
    /// Unique module id; also the base of scheduler set ids.
    fn id(&self) -> &str;

    /// Execution archetype.
    fn archetype(&self) -> Archetype;

    /// Executable name or path.
    fn program(&self) -> &str;

    /// Accepted parameters, in command-line order.
    fn scheme(&self) -> &ParamScheme;

    /// Builds the command line from resolved parameters; target hosts go last.
    fn build_command(&self, params: &Params, hosts: &[String]) -> CommandLine {
        CommandLine::new(self.program())
            .args(self.scheme().render(params))
            .args(hosts.iter().cloned())
    }

    /// Turns raw output into findings.
    ///
    /// Active modules get the complete output of one run, passive modules one
    /// polling buffer (which may end mid-line).
    fn parse_output(&self, raw: &[u8], hosts: &[String], sink: &dyn Sink);

    /// Default queue countdown, in ticks.
    fn timer(&self) -> u64 {
        60
    }

    /// Maximum duration of one active run, in ticks.
    fn max_duration(&self) -> u64 {
        120
    }

    /// Output polling interval of a passive run, in ticks.
    fn read_interval(&self) -> u64 {
        10
    }
}
