//! # Example: ping_routine
//!
//! Sweeps a few hosts with `fping` every 10 ticks and watches ARP traffic
//! with `tcpdump` until Ctrl-C.
//!
//! Shows how to:
//! - Build an [`Orchestrator`] with the built-in catalog.
//! - Attach the [`LogWriter`] and route its output through `tracing-subscriber`.
//! - Collect findings with a [`MemorySink`].
//!
//! ## Flow
//! ```text
//! Orchestrator::run()
//!     ├─► ticker.start()
//!     ├─► routine.resume()
//!     │     ├─► Queue: fping countdown 10 → 0 → launch → parse → Finding::HostAlive
//!     │     └─► Panel: tcpdump arp → Communicator every read interval → Finding::HostSeen
//!     └─► Ctrl-C ─► routine.stop() within grace
//! ```
//!
//! ## Run
//! `fping` and `tcpdump` must be on `PATH` (tcpdump usually needs root).
//! ```bash
//! RUST_LOG=netvisor=debug cargo run --example ping_routine -- 192.168.1.1 192.168.1.254
//! ```

use std::sync::Arc;
use std::time::Duration;

use netvisor::{AddOptions, Config, LogWriter, MemorySink, Orchestrator, Params, Subscribe};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netvisor=info")),
        )
        .init();

    let mut hosts: Vec<String> = std::env::args().skip(1).collect();
    if hosts.is_empty() {
        hosts.push("127.0.0.1".into());
    }

    let cfg = Config {
        grace: Duration::from_secs(10),
        ..Config::default()
    };
    let findings = Arc::new(MemorySink::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let orch = Orchestrator::builder(cfg)
        .with_subscribers(subs)
        .with_sink(findings.clone())
        .build();

    let sweep = orch
        .add("fping", &Params::new(), AddOptions::hosts(hosts).countdown(1))
        .await?;
    let arp: Params = [("interface".to_string(), "any".to_string())].into();
    let watch = orch.add("arpwatch", &arp, AddOptions::default()).await?;
    println!("scheduled {sweep} (queue) and {watch} (panel); Ctrl-C to stop");

    let outcome = orch.run().await;

    for (module, finding) in findings.take() {
        println!("{module}: {}", serde_json::to_string(&finding)?);
    }
    outcome?;
    Ok(())
}
