//! # Example: custom_module
//!
//! Implements the [`Module`] trait for a program netvisor does not ship
//! (`ss`, listing listening TCP sockets), registers it next to a
//! [`CommandModule`], and prints a snapshot of the routine.
//!
//! ## Flow
//! ```text
//! Catalog::with_builtins() + ListeningSockets + CommandModule("uptime")
//!     └─► Orchestrator::run_until(15s)
//!           ├─► Queue: ss -tln every 5 ticks  ─► Finding::OpenPort
//!           └─► Queue: uptime every 3 ticks    ─► Finding::Line
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_module
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netvisor::{
    AddOptions, Archetype, Catalog, CommandModule, Config, Event, EventKind, Finding, Module,
    Orchestrator, ParamScheme, ParamSpec, Params, Sink, Subscribe,
};

/// Listening TCP sockets via `ss -tln`.
struct ListeningSockets {
    scheme: ParamScheme,
}

impl ListeningSockets {
    fn new() -> Self {
        Self {
            scheme: ParamScheme::new()
                .with(ParamSpec::flag("tcp", "-t").default_value("yes"))
                .with(ParamSpec::flag("listening", "-l").default_value("yes"))
                .with(ParamSpec::flag("numeric", "-n").default_value("yes")),
        }
    }
}

impl Module for ListeningSockets {
    fn id(&self) -> &str {
        "sockets"
    }
    fn archetype(&self) -> Archetype {
        Archetype::Active
    }
    fn program(&self) -> &str {
        "ss"
    }
    fn scheme(&self) -> &ParamScheme {
        &self.scheme
    }
    fn timer(&self) -> u64 {
        5
    }
    fn max_duration(&self) -> u64 {
        5
    }

    fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
        let text = String::from_utf8_lossy(raw);
        // State Recv-Q Send-Q Local-Address:Port Peer-Address:Port
        for line in text.lines().skip(1) {
            let Some(local) = line.split_whitespace().nth(3) else {
                continue;
            };
            let Some((address, port)) = local.rsplit_once(':') else {
                continue;
            };
            if let Ok(port) = port.parse() {
                sink.report(
                    self.id(),
                    Finding::OpenPort {
                        address: address.trim_matches(['[', ']']).to_string(),
                        port,
                        protocol: "tcp".into(),
                    },
                );
            }
        }
    }
}

/// Prints findings as they are parsed.
struct Printer;

impl Sink for Printer {
    fn report(&self, module: &str, finding: Finding) {
        println!("[{module}] {finding:?}");
    }
}

/// Prints process exits.
struct Exits;

#[async_trait]
impl Subscribe for Exits {
    async fn on_event(&self, ev: &Event) {
        if let EventKind::ModuleExited = ev.kind {
            println!(
                "[exit] {} code={}",
                ev.set_id.as_deref().unwrap_or("-"),
                ev.exit_code.unwrap_or_default()
            );
        }
    }
    fn name(&self) -> &'static str {
        "exits"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut catalog = Catalog::with_builtins();
    catalog.register(Arc::new(ListeningSockets::new()));
    catalog.register(Arc::new(
        CommandModule::new("uptime", "uptime", Archetype::Active)
            .param(ParamSpec::flag("pretty", "-p").default_value("yes"))
            .with_timer(3)
            .with_max_duration(2),
    ));

    let cfg = Config {
        tick: Duration::from_millis(500),
        ..Config::default()
    };
    let orch = Orchestrator::builder(cfg)
        .with_catalog(catalog)
        .with_sink(Arc::new(Printer))
        .with_subscribers(vec![Arc::new(Exits) as Arc<dyn Subscribe>])
        .build();

    orch.add("sockets", &Params::new(), AddOptions::default().countdown(1)).await?;
    orch.add("uptime", &Params::new(), AddOptions::default()).await?;

    println!("{}", serde_json::to_string_pretty(&orch.routine().snapshot())?);

    orch.run_until(async {
        tokio::time::sleep(Duration::from_secs(15)).await;
        Ok(())
    })
    .await?;
    Ok(())
}
