use std::net::IpAddr;

use crate::modules::{Archetype, Finding, Module, ParamScheme, ParamSpec, Sink};

/// ICMP sweep over the target hosts with `fping`.
///
/// Understands both `fping -a` output (one alive address per line) and the
/// per-host summary printed with `-c` (`addr : xmt/rcv/%loss = 1/1/0%, ...`).
#[derive(Clone, Debug)]
pub struct PingSweep {
    scheme: ParamScheme,
}

impl PingSweep {
    /// Module id.
    pub const ID: &'static str = "fping";

    /// Default scheme: `-a`, one retry, 500ms per-target timeout.
    pub fn new() -> Self {
        Self {
            scheme: ParamScheme::new()
                .with(ParamSpec::flag("alive", "-a").default_value("yes"))
                .with(ParamSpec::value("count", "-c"))
                .with(ParamSpec::value("retries", "-r").default_value("1").mandatory())
                .with(ParamSpec::value("timeout", "-t").default_value("500").mandatory()),
        }
    }
}

impl Default for PingSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for PingSweep {
    fn id(&self) -> &str {
        Self::ID
    }

    fn archetype(&self) -> Archetype {
        Archetype::Active
    }

    fn program(&self) -> &str {
        "fping"
    }

    fn scheme(&self) -> &ParamScheme {
        &self.scheme
    }

    fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
        for line in String::from_utf8_lossy(raw).lines() {
            let mut tokens = line.split_whitespace();
            let Some(addr) = tokens.next().and_then(|t| t.parse::<IpAddr>().ok()) else {
                continue;
            };
            let rest: Vec<&str> = tokens.collect();
            if is_alive(&rest) {
                sink.report(Self::ID, Finding::HostAlive { address: addr.to_string() });
            }
        }
    }

    fn timer(&self) -> u64 {
        60
    }

    fn max_duration(&self) -> u64 {
        60
    }
}

/// Classifies the tokens following the address.
fn is_alive(rest: &[&str]) -> bool {
    match rest {
        [] => true,
        ["is", "alive", ..] => true,
        [":", "xmt/rcv/%loss", "=", stats, ..] => stats
            .trim_end_matches(',')
            .split('/')
            .nth(1)
            .and_then(|rcv| rcv.parse::<u32>().ok())
            .is_some_and(|rcv| rcv > 0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::MemorySink;

    #[test]
    fn parses_alive_lines_and_summaries() {
        let raw = b"10.0.0.1\n\
10.0.0.2 is alive\n\
10.0.0.3 : xmt/rcv/%loss = 1/1/0%, min/avg/max = 0.31/0.31/0.31\n\
10.0.0.4 : xmt/rcv/%loss = 1/0/100%\n\
10.0.0.5 is unreachable\n\
ICMP Host Unreachable from 10.0.0.254\n";
        let sink = MemorySink::new();
        PingSweep::new().parse_output(raw, &[], &sink);

        let alive: Vec<String> = sink
            .findings()
            .into_iter()
            .map(|(_, f)| match f {
                Finding::HostAlive { address } => address,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(alive, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn command_places_hosts_last() {
        let m = PingSweep::new();
        let params = m.scheme().resolve(m.id(), &Default::default()).unwrap();
        let cmd = m.build_command(&params, &["10.0.0.1".into(), "10.0.0.2".into()]);
        assert_eq!(cmd.to_string(), "fping -a -r 1 -t 500 10.0.0.1 10.0.0.2");
    }
}
