//! Fan-out of runtime events to [`Subscribe`] implementations.
//!
//! Each subscriber gets its own bounded queue and worker task, so a slow or
//! panicking subscriber only hurts itself:
//!
//! ```text
//! emit(ev) ──try_send──► queue(sub A) ──► worker A ──► A.on_event(ev)
//!          ──try_send──► queue(sub B) ──► worker B ──► B.on_event(ev)
//!                         full/closed ──► SubscriberOverflow on the bus
//! ```
//!
//! Ordering holds per subscriber only. Panics are caught with
//! `AssertUnwindSafe` and reported as `SubscriberPanicked`; state a subscriber
//! mutated before panicking is left as is.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, panic_message};
use crate::subscribers::Subscribe;

/// Sending half of one subscriber's queue.
struct Lane {
    subscriber: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Subscribers attached to one orchestrator run.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns a worker per subscriber. Requires a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    subscriber: sub.name(),
                    queue: tx,
                };
                (lane, tokio::spawn(deliver(sub, rx, bus.clone())))
            })
            .unzip();
        Self { lanes, workers, bus }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues `event` for every subscriber without waiting.
    ///
    /// A subscriber whose queue is full or gone misses the event and a
    /// `SubscriberOverflow` is published, unless the event was itself one.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if !shared.is_subscriber_overflow() {
                self.bus
                    .publish(Event::subscriber_overflow(lane.subscriber, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have drained them.
    pub async fn shutdown(self) {
        drop(self.lanes);
        futures::future::join_all(self.workers).await;
    }
}

/// Worker loop of one subscriber.
async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
        if let Err(payload) = handled {
            bus.publish(Event::subscriber_panicked(
                sub.name(),
                panic_message(payload.as_ref()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.0.lock().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber blew up");
        }
        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_isolates_panics() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let collect = Arc::new(Collect::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![collect.clone(), Arc::new(Explode)];
        let set = SubscriberSet::new(subs, bus.clone());
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::TickerStarted));
        set.emit(&Event::new(EventKind::TickerStopped));
        set.shutdown().await;

        assert_eq!(
            *collect.0.lock(),
            vec![EventKind::TickerStarted, EventKind::TickerStopped]
        );
        let ev = rx.recv().await.expect("panic event");
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.module.as_deref(), Some("explode"));
    }

    struct Stalled(tokio::sync::Notify);

    #[async_trait]
    impl Subscribe for Stalled {
        async fn on_event(&self, _event: &Event) {
            self.0.notified().await;
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn full_queue_drops_and_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stalled = Arc::new(Stalled(tokio::sync::Notify::new()));
        let set = SubscriberSet::new(vec![stalled.clone() as Arc<dyn Subscribe>], bus.clone());

        for _ in 0..3 {
            set.emit(&Event::new(EventKind::TickerStarted));
            tokio::task::yield_now().await;
        }
        let ev = rx.recv().await.expect("overflow event");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.module.as_deref(), Some("stalled"));

        while rx.try_recv().is_ok() {}
        set.emit(&ev);
        assert!(rx.try_recv().is_err());
    }
}
