//! # Ticker: fixed-period dispatch to [`Decrement`] subscribers.
//!
//! ## Rules
//! - Subscribers are called **synchronously**, in subscription order.
//! - The subscriber list is snapshotted before each dispatch, so `subscribe` /
//!   `unsubscribe` may run concurrently with a tick, including from inside a
//!   `decrement()` call.
//! - A panicking `decrement()` is caught and published as `DecrementPanicked`;
//!   the remaining subscribers still get the tick.
//! - `start()` on a running ticker is a no-op (publishes `TickerAlreadyRunning`).
//! - `stop()` cancels the loop token; the loop exits after its current sleep,
//!   never in the middle of a dispatch.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind, panic_message};
use crate::ticker::Decrement;

/// Shared periodic broadcaster. Cheap to clone; clones drive the same loop.
#[derive(Clone)]
pub struct Ticker {
    inner: Arc<Inner>,
}

struct Inner {
    period: Duration,
    bus: Bus,
    subscribers: Mutex<Vec<Arc<dyn Decrement>>>,
    token: Mutex<Option<CancellationToken>>,
}

impl Ticker {
    /// Creates a stopped ticker with the given period.
    pub fn new(period: Duration, bus: Bus) -> Self {
        Self {
            inner: Arc::new(Inner {
                period,
                bus,
                subscribers: Mutex::new(Vec::new()),
                token: Mutex::new(None),
            }),
        }
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Registers a subscriber. Returns `false` if it was already registered.
    pub fn subscribe(&self, sub: Arc<dyn Decrement>) -> bool {
        let mut subs = self.inner.subscribers.lock();
        if subs.iter().any(|s| same(s, &sub)) {
            return false;
        }
        subs.push(sub);
        true
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, sub: &Arc<dyn Decrement>) -> bool {
        let mut subs = self.inner.subscribers.lock();
        let before = subs.len();
        subs.retain(|s| !same(s, sub));
        subs.len() != before
    }

    /// Whether `sub` is currently registered.
    pub fn is_subscribed(&self, sub: &Arc<dyn Decrement>) -> bool {
        self.inner.subscribers.lock().iter().any(|s| same(s, sub))
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Whether the tick loop is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .token
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Starts the tick loop on the current tokio runtime.
    pub fn start(&self) {
        let token = {
            let mut slot = self.inner.token.lock();
            if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
                self.inner
                    .bus
                    .publish(Event::new(EventKind::TickerAlreadyRunning));
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        let period = self.inner.period;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if token.is_cancelled() {
                    break;
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.dispatch();
            }
        });
        self.inner.bus.publish(Event::new(EventKind::TickerStarted));
    }

    /// Asks the tick loop to stop after its current sleep.
    pub fn stop(&self) {
        if let Some(token) = self.inner.token.lock().take() {
            token.cancel();
            self.inner.bus.publish(Event::new(EventKind::TickerStopped));
        }
    }

    /// Runs one tick synchronously on the calling thread.
    pub fn dispatch(&self) {
        self.inner.dispatch();
    }
}

impl Inner {
    fn dispatch(&self) {
        let snapshot: Vec<Arc<dyn Decrement>> = self.subscribers.lock().clone();
        for sub in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if sub.is_decrementable() {
                    sub.decrement();
                }
            }));
            if let Err(payload) = outcome {
                self.bus.publish(
                    Event::new(EventKind::DecrementPanicked)
                        .with_reason(panic_message(payload.as_ref())),
                );
            }
        }
    }
}

/// Identity comparison that ignores vtable pointers.
fn same(a: &Arc<dyn Decrement>, b: &Arc<dyn Decrement>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct Counter {
        hits: AtomicU64,
        muted: AtomicBool,
    }

    impl Decrement for Counter {
        fn is_decrementable(&self) -> bool {
            !self.muted.load(Ordering::SeqCst)
        }
        fn decrement(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Faulty;

    impl Decrement for Faulty {
        fn is_decrementable(&self) -> bool {
            true
        }
        fn decrement(&self) {
            panic!("decrement failed");
        }
    }

    fn ticker() -> (Ticker, Bus) {
        let bus = Bus::new(64);
        (Ticker::new(Duration::from_millis(100), bus.clone()), bus)
    }

    #[test]
    fn subscribe_is_idempotent_per_instance() {
        let (t, _) = ticker();
        let c: Arc<dyn Decrement> = Arc::new(Counter::default());
        assert!(t.subscribe(c.clone()));
        assert!(!t.subscribe(c.clone()));
        assert_eq!(t.subscriber_count(), 1);
        assert!(t.unsubscribe(&c));
        assert!(!t.unsubscribe(&c));
    }

    #[test]
    fn dispatch_skips_muted_and_survives_panics() {
        let (t, bus) = ticker();
        let mut rx = bus.subscribe();
        let live = Arc::new(Counter::default());
        let muted = Arc::new(Counter::default());
        muted.muted.store(true, Ordering::SeqCst);

        t.subscribe(Arc::new(Faulty));
        t.subscribe(live.clone());
        t.subscribe(muted.clone());
        t.dispatch();

        assert_eq!(live.hits.load(Ordering::SeqCst), 1);
        assert_eq!(muted.hits.load(Ordering::SeqCst), 0);
        let ev = rx.try_recv().expect("panic reported");
        assert_eq!(ev.kind, EventKind::DecrementPanicked);
        assert_eq!(ev.reason.as_deref(), Some("decrement failed"));
    }

    /// Swaps itself for `newcomer` on its first tick.
    struct Rewirer {
        me: Weak<Rewirer>,
        ticker: Ticker,
        newcomer: Arc<Counter>,
        hits: AtomicU64,
    }

    impl Decrement for Rewirer {
        fn is_decrementable(&self) -> bool {
            true
        }
        fn decrement(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = self.me.upgrade() {
                let me: Arc<dyn Decrement> = me;
                self.ticker.unsubscribe(&me);
            }
            self.ticker.subscribe(self.newcomer.clone());
        }
    }

    #[test]
    fn decrement_may_rewire_subscriptions_mid_dispatch() {
        let (t, _) = ticker();
        let newcomer = Arc::new(Counter::default());
        let later = Arc::new(Counter::default());
        let rewirer = Arc::new_cyclic(|me| Rewirer {
            me: me.clone(),
            ticker: t.clone(),
            newcomer: newcomer.clone(),
            hits: AtomicU64::new(0),
        });
        t.subscribe(rewirer.clone());
        t.subscribe(later.clone());

        t.dispatch();
        assert_eq!(rewirer.hits.load(Ordering::SeqCst), 1);
        assert_eq!(later.hits.load(Ordering::SeqCst), 1);
        assert_eq!(newcomer.hits.load(Ordering::SeqCst), 0);

        t.dispatch();
        assert_eq!(rewirer.hits.load(Ordering::SeqCst), 1);
        assert_eq!(later.hits.load(Ordering::SeqCst), 2);
        assert_eq!(newcomer.hits.load(Ordering::SeqCst), 1);
        assert_eq!(t.subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_until_stopped() {
        let (t, bus) = ticker();
        let mut rx = bus.subscribe();
        let c = Arc::new(Counter::default());
        t.subscribe(c.clone());

        t.start();
        t.start();
        assert!(t.is_running());
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(c.hits.load(Ordering::SeqCst), 3);

        t.stop();
        assert!(!t.is_running());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(c.hits.load(Ordering::SeqCst), 3);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TickerStarted,
                EventKind::TickerAlreadyRunning,
                EventKind::TickerStopped
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_double_the_rate() {
        let (t, _) = ticker();
        let c = Arc::new(Counter::default());
        t.subscribe(c.clone());

        t.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        t.stop();
        t.start();
        tokio::time::sleep(Duration::from_millis(1020)).await;
        // 1 tick before the restart, 10 after; the first loop exits at its next wake-up.
        assert_eq!(c.hits.load(Ordering::SeqCst), 11);
        t.stop();
    }
}
