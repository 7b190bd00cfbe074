use crate::modules::{Archetype, Finding, Module, ParamScheme, ParamSpec, Sink};

/// Host discovery and optional port scan with `nmap`, grepable output on stdout.
///
/// Parsed record shapes (`-oG -`):
/// ```text
/// Host: 10.0.0.1 (gw.lan)	Status: Up
/// Host: 10.0.0.1 (gw.lan)	Ports: 22/open/tcp//ssh///, 80/closed/tcp//http///
/// ```
#[derive(Clone, Debug)]
pub struct NmapDiscovery {
    scheme: ParamScheme,
}

impl NmapDiscovery {
    /// Module id.
    pub const ID: &'static str = "nmap";

    /// Default scheme: ping scan only, grepable output, aggressive timing.
    pub fn new() -> Self {
        Self {
            scheme: ParamScheme::new()
                .with(ParamSpec::flag("ping_only", "-sn").default_value("yes"))
                .with(ParamSpec::value("ports", "-p"))
                .with(ParamSpec::value("timing", "-T").default_value("4"))
                .with(ParamSpec::value("host_timeout", "--host-timeout").default_value("30s"))
                .with(ParamSpec::value("format", "-oG").default_value("-").mandatory()),
        }
    }
}

impl Default for NmapDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for NmapDiscovery {
    fn id(&self) -> &str {
        Self::ID
    }

    fn archetype(&self) -> Archetype {
        Archetype::Active
    }

    fn program(&self) -> &str {
        "nmap"
    }

    fn scheme(&self) -> &ParamScheme {
        &self.scheme
    }

    fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
        for line in String::from_utf8_lossy(raw).lines() {
            let Some(record) = line.strip_prefix("Host: ") else {
                continue;
            };
            let mut fields = record.split('\t');
            let Some(address) = fields
                .next()
                .and_then(|host| host.split_whitespace().next())
            else {
                continue;
            };

            for field in fields {
                if let Some(status) = field.strip_prefix("Status: ") {
                    if status.trim() == "Up" {
                        sink.report(Self::ID, Finding::HostAlive { address: address.to_string() });
                    }
                } else if let Some(ports) = field.strip_prefix("Ports: ") {
                    for port in ports.split(',').filter_map(parse_open_port) {
                        sink.report(
                            Self::ID,
                            Finding::OpenPort {
                                address: address.to_string(),
                                port: port.0,
                                protocol: port.1.to_string(),
                            },
                        );
                    }
                }
            }
        }
    }

    fn timer(&self) -> u64 {
        300
    }

    fn max_duration(&self) -> u64 {
        340
    }
}

/// `22/open/tcp//ssh///` → `(22, "tcp")`; non-open states are skipped.
fn parse_open_port(entry: &str) -> Option<(u16, &str)> {
    let mut parts = entry.trim().split('/');
    let port = parts.next()?.parse().ok()?;
    let state = parts.next()?;
    let protocol = parts.next()?;
    (state == "open").then_some((port, protocol))
}
