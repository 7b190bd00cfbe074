use crate::modules::{Archetype, Finding, Module, ParamScheme, ParamSpec, Params, Sink};
use crate::process::CommandLine;

/// Passive ARP listener built on `tcpdump`.
///
/// Runs until interrupted; every polling buffer is scanned for
/// `who-has X tell Y` requests and `X is-at MAC` replies.
#[derive(Clone, Debug)]
pub struct ArpWatch {
    scheme: ParamScheme,
}

impl ArpWatch {
    /// Module id.
    pub const ID: &'static str = "arpwatch";

    /// Default scheme: all interfaces, numeric, line-buffered, `arp` filter.
    pub fn new() -> Self {
        Self {
            scheme: ParamScheme::new()
                .with(ParamSpec::value("interface", "-i").default_value("any").mandatory())
                .with(ParamSpec::flag("numeric", "-n").default_value("yes"))
                .with(ParamSpec::flag("line_buffered", "-l").default_value("yes"))
                .with(ParamSpec::value("filter", "").default_value("arp").mandatory()),
        }
    }
}

impl Default for ArpWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for ArpWatch {
    fn id(&self) -> &str {
        Self::ID
    }

    fn archetype(&self) -> Archetype {
        Archetype::Passive
    }

    fn program(&self) -> &str {
        "tcpdump"
    }

    fn scheme(&self) -> &ParamScheme {
        &self.scheme
    }

    /// Hosts are not appended: they would be parsed as part of the capture filter.
    fn build_command(&self, params: &Params, _hosts: &[String]) -> CommandLine {
        CommandLine::new(self.program()).args(self.scheme.render(params))
    }

    fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
        for line in String::from_utf8_lossy(raw).lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            for window in tokens.windows(3) {
                match window {
                    [addr, "is-at", mac] => sink.report(
                        Self::ID,
                        Finding::HostSeen {
                            address: addr.to_string(),
                            mac: Some(mac.trim_end_matches(',').to_string()),
                        },
                    ),
                    [_, "tell", addr] => sink.report(
                        Self::ID,
                        Finding::HostSeen {
                            address: addr.trim_end_matches(',').to_string(),
                            mac: None,
                        },
                    ),
                    _ => {}
                }
            }
        }
    }

    fn read_interval(&self) -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::MemorySink;

    #[test]
    fn ignores_hosts_in_command() {
        let m = ArpWatch::new();
        let params = m.scheme().resolve(m.id(), &Default::default()).unwrap();
        let cmd = m.build_command(&params, &["10.0.0.1".into()]);
        assert_eq!(cmd.to_string(), "tcpdump -i any -n -l arp");
    }

    #[test]
    fn parses_requests_and_replies() {
        let raw = b"12:00:01.000 ARP, Request who-has 10.0.0.5 tell 10.0.0.1, length 28\n\
12:00:01.001 ARP, Reply 10.0.0.5 is-at aa:bb:cc:dd:ee:ff, length 28\n";
        let sink = MemorySink::new();
        ArpWatch::new().parse_output(raw, &[], &sink);

        let got: Vec<Finding> = sink.findings().into_iter().map(|(_, f)| f).collect();
        assert_eq!(
            got,
            vec![
                Finding::HostSeen { address: "10.0.0.1".into(), mac: None },
                Finding::HostSeen {
                    address: "10.0.0.5".into(),
                    mac: Some("aa:bb:cc:dd:ee:ff".into())
                },
            ]
        );
    }
}
