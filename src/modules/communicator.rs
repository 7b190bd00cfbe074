//! # Communicator: ticker-paced reader of a passive process's output.
//!
//! ```text
//! tick ─► decrement(): countdown -= 1 (saturating)
//!           countdown > 0            → return
//!           slot busy                → ReadOverrun, return (countdown stays 0)
//!           slot free                → spawn_blocking(read) into the slot
//!
//! read:  output.take() ─► non-empty? ─► OutputDelivered + parse_output
//!        countdown = interval
//! ```
//!
//! The read never runs on the ticker's thread. `interrupt()` clears the
//! reading flag, unsubscribes and joins the in-flight read for at most
//! `join_bound`, aborting it (and publishing `ReaderStuck`) past the bound.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::events::{Event, EventKind};
use crate::modules::{Context, Module};
use crate::process::OutputBuffer;
use crate::ticker::Decrement;

pub(crate) struct Communicator {
    me: Weak<Communicator>,
    module: Arc<dyn Module>,
    ctx: Context,
    hosts: Arc<[String]>,
    output: OutputBuffer,
    interval: u64,
    countdown: AtomicU64,
    reading: AtomicBool,
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl Communicator {
    /// Creates a communicator that is enabled but not yet subscribed.
    pub(crate) fn new(
        module: Arc<dyn Module>,
        ctx: Context,
        hosts: Vec<String>,
        output: OutputBuffer,
    ) -> Arc<Self> {
        let interval = module.read_interval().max(1);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            module,
            ctx,
            hosts: hosts.into(),
            output,
            interval,
            countdown: AtomicU64::new(interval),
            reading: AtomicBool::new(true),
            slot: Mutex::new(None),
        })
    }

    /// Subscribes to the shared ticker.
    pub(crate) fn start(self: &Arc<Self>) {
        let me: Arc<dyn Decrement> = self.clone();
        self.ctx.ticker.subscribe(me);
    }

    /// Whether the communicator still takes ticks or has a read in flight.
    pub(crate) fn is_active(&self) -> bool {
        self.reading.load(Ordering::SeqCst)
            || self.slot.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops reading and joins the in-flight read within `join_bound`.
    pub(crate) async fn interrupt(self: &Arc<Self>) {
        self.reading.store(false, Ordering::SeqCst);
        let me: Arc<dyn Decrement> = self.clone();
        self.ctx.ticker.unsubscribe(&me);

        let Some(mut task) = self.slot.lock().take() else {
            return;
        };
        let bound = self.ctx.config.join_bound;
        if tokio::time::timeout(bound, &mut task).await.is_err() {
            self.ctx.bus.publish(
                Event::new(EventKind::ReaderStuck)
                    .with_module(self.module.id())
                    .with_timeout(bound),
            );
            task.abort();
        }
    }

    /// One read of everything buffered so far.
    fn read(&self) {
        let raw = self.output.take();
        if !raw.is_empty() {
            self.ctx.bus.publish(
                Event::new(EventKind::OutputDelivered)
                    .with_module(self.module.id())
                    .with_bytes(raw.len()),
            );
            self.module
                .parse_output(&raw, &self.hosts, self.ctx.sink.as_ref());
        }
        self.countdown.store(self.interval, Ordering::SeqCst);
    }
}

impl Decrement for Communicator {
    fn is_decrementable(&self) -> bool {
        self.reading.load(Ordering::SeqCst)
    }

    fn decrement(&self) {
        let left = self
            .countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_sub(1)))
            .map_or(0, |prev| prev.saturating_sub(1));
        if left > 0 {
            return;
        }

        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            self.ctx
                .bus
                .publish(Event::new(EventKind::ReadOverrun).with_module(self.module.id()));
            return;
        }
        let Some(me) = self.me.upgrade() else {
            return;
        };
        *slot = Some(tokio::task::spawn_blocking(move || me.read()));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::events::Bus;
    use crate::modules::{Archetype, Finding, MemorySink, ParamScheme, Sink};
    use crate::process::OsLauncher;

    struct Lines {
        scheme: ParamScheme,
        interval: u64,
    }

    impl Module for Lines {
        fn id(&self) -> &str {
            "lines"
        }
        fn archetype(&self) -> Archetype {
            Archetype::Passive
        }
        fn program(&self) -> &str {
            "cat"
        }
        fn scheme(&self) -> &ParamScheme {
            &self.scheme
        }
        fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
            for line in String::from_utf8_lossy(raw).lines() {
                sink.report(self.id(), Finding::Line { line: line.to_string() });
            }
        }
        fn read_interval(&self) -> u64 {
            self.interval
        }
    }

    fn setup(interval: u64) -> (Arc<Communicator>, OutputBuffer, Arc<MemorySink>, Bus) {
        let sink = Arc::new(MemorySink::new());
        let bus = Bus::new(64);
        let ctx = Context::new(Config::default(), bus.clone(), sink.clone(), Arc::new(OsLauncher));
        let output = OutputBuffer::new();
        let module = Arc::new(Lines {
            scheme: ParamScheme::new(),
            interval,
        });
        let comm = Communicator::new(module, ctx, vec![], output.clone());
        (comm, output, sink, bus)
    }

    async fn settle(comm: &Communicator) {
        let task = comm.slot.lock().take();
        if let Some(task) = task {
            task.await.expect("read task");
        }
    }

    #[tokio::test]
    async fn reads_every_interval_ticks() {
        let (comm, output, sink, _bus) = setup(3);
        output.append(b"arp reply 10.0.0.1\n");

        comm.decrement();
        comm.decrement();
        assert!(comm.slot.lock().is_none());
        comm.decrement();
        settle(&comm).await;

        assert_eq!(sink.len(), 1);
        assert_eq!(comm.countdown.load(Ordering::SeqCst), 3);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn busy_slot_reports_overrun() {
        let (comm, _output, _sink, bus) = setup(1);
        let mut rx = bus.subscribe();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        *comm.slot.lock() = Some(tokio::task::spawn_blocking(move || {
            let _ = release_rx.recv();
        }));

        comm.decrement();
        let ev = rx.try_recv().expect("overrun event");
        assert_eq!(ev.kind, EventKind::ReadOverrun);

        release_tx.send(()).expect("release");
        settle(&comm).await;
        comm.decrement();
        assert!(comm.slot.lock().is_some());
        settle(&comm).await;
    }

    #[tokio::test]
    async fn interrupt_unsubscribes_and_aborts_stuck_reads() {
        let (comm, _output, _sink, bus) = setup(5);
        let mut rx = bus.subscribe();
        comm.start();
        assert_eq!(comm.ctx.ticker.subscriber_count(), 1);

        *comm.slot.lock() = Some(tokio::spawn(std::future::pending::<()>()));
        tokio::time::pause();
        comm.interrupt().await;

        assert!(!comm.is_decrementable());
        assert!(!comm.is_active());
        assert_eq!(comm.ctx.ticker.subscriber_count(), 0);
        let ev = rx.try_recv().expect("stuck event");
        assert_eq!(ev.kind, EventKind::ReaderStuck);
        assert_eq!(ev.timeout_ms, Some(Duration::from_secs(1).as_millis() as u32));
    }
}
