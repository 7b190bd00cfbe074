//! # Queue: countdown scheduler for active instances.
//!
//! Entries are kept ascending by remaining countdown. Every tick:
//! ```text
//! for entry in order:
//!     countdown = countdown.saturating_sub(1)
//!     countdown == 0 → mark fired, countdown = initial
//! stable sort by (countdown, fired)      fired entries go last in their tie group
//! launch fired instances, in list order, outside the lock
//! ```
//! An entry sitting at 0 when the tick arrives fires on that tick.
//!
//! `resume()` subscribes the queue to the ticker (idempotent); `pause(kill)`
//! unsubscribes it and optionally stops every member. Pausing never cancels
//! in-flight runs unless `kill` is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::ScheduleError;
use crate::events::{Event, EventKind};
use crate::modules::{Archetype, Context, ModuleInstance};
use crate::schedule::snapshot::QueueEntrySnapshot;
use crate::schedule::{AddOptions, unique_set_id};
use crate::ticker::Decrement;

struct QueueEntry {
    set_id: String,
    instance: Arc<ModuleInstance>,
    hosts: Vec<String>,
    countdown: u64,
    initial: u64,
}

/// Active-module scheduler.
pub struct Queue {
    me: Weak<Queue>,
    ctx: Context,
    running: AtomicBool,
    entries: Mutex<Vec<QueueEntry>>,
}

impl Queue {
    /// Creates a paused, empty queue.
    pub fn new(ctx: &Context) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            ctx: ctx.clone(),
            running: AtomicBool::new(false),
            entries: Mutex::new(Vec::new()),
        })
    }

    /// Adds an active instance and returns its set id.
    ///
    /// # Errors
    /// - [`ScheduleError::ArchetypeMismatch`] for passive instances
    /// - [`ScheduleError::DuplicateModule`] if this very instance is already queued
    /// - [`ScheduleError::DuplicateSetId`] if the requested set id is taken
    pub fn add_module(
        &self,
        instance: Arc<ModuleInstance>,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        let module = instance.id().to_string();
        let result = self.insert(instance, opts);
        match &result {
            Ok(set_id) => self.ctx.bus.publish(
                Event::new(EventKind::EntryAdded)
                    .with_module(module.as_str())
                    .with_set_id(set_id.as_str())
                    .with_reason("queue"),
            ),
            Err(err) => self.ctx.bus.publish(
                Event::new(EventKind::EntryRejected)
                    .with_module(module)
                    .with_reason(err.to_string()),
            ),
        }
        result
    }

    fn insert(
        &self,
        instance: Arc<ModuleInstance>,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        if instance.archetype() != Archetype::Active {
            return Err(ScheduleError::ArchetypeMismatch {
                module: instance.id().to_string(),
                expected: Archetype::Active,
                found: instance.archetype(),
            });
        }

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.iter().find(|e| Arc::ptr_eq(&e.instance, &instance)) {
            return Err(ScheduleError::DuplicateModule {
                module: instance.id().to_string(),
                set_id: existing.set_id.clone(),
            });
        }
        let taken = |id: &str| entries.iter().any(|e| e.set_id == id);
        let set_id = match opts.set_id {
            Some(id) if taken(&id) => return Err(ScheduleError::DuplicateSetId(id)),
            Some(id) => id,
            None => unique_set_id(instance.id(), taken),
        };

        let countdown = opts.countdown.unwrap_or_else(|| instance.module().timer());
        let at = entries
            .iter()
            .position(|e| e.countdown >= countdown)
            .unwrap_or(entries.len());
        entries.insert(
            at,
            QueueEntry {
                set_id: set_id.clone(),
                instance,
                hosts: opts.hosts,
                countdown,
                initial: countdown,
            },
        );
        Ok(set_id)
    }

    /// Stops the instance behind `set_id` and removes its entry.
    ///
    /// The entry stays in place when stopping fails.
    pub async fn remove_module(&self, set_id: &str) -> Result<Arc<ModuleInstance>, ScheduleError> {
        let instance = self
            .instance(set_id)
            .ok_or_else(|| ScheduleError::UnknownSetId(set_id.to_string()))?;
        instance.stop().await?;
        self.entries.lock().retain(|e| e.set_id != set_id);
        self.ctx.bus.publish(
            Event::new(EventKind::EntryRemoved)
                .with_module(instance.id())
                .with_set_id(set_id),
        );
        Ok(instance)
    }

    /// Subscribes to the ticker. No-op when already running.
    pub fn resume(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(me) = self.me.upgrade() {
            let me: Arc<dyn Decrement> = me;
            self.ctx.ticker.subscribe(me);
        }
        self.ctx
            .bus
            .publish(Event::new(EventKind::SchedulerResumed).with_reason("queue"));
    }

    /// Unsubscribes from the ticker; with `kill`, also stops every member.
    pub async fn pause(&self, kill: bool) -> Result<(), ScheduleError> {
        if self.running.swap(false, Ordering::SeqCst) {
            if let Some(me) = self.me.upgrade() {
                let me: Arc<dyn Decrement> = me;
                self.ctx.ticker.unsubscribe(&me);
            }
            self.ctx
                .bus
                .publish(Event::new(EventKind::SchedulerPaused).with_reason("queue"));
        }
        if !kill {
            return Ok(());
        }

        let members: Vec<(String, Arc<ModuleInstance>)> = self
            .entries
            .lock()
            .iter()
            .map(|e| (e.set_id.clone(), Arc::clone(&e.instance)))
            .collect();
        let mut stuck = Vec::new();
        for (set_id, instance) in members {
            if instance.stop().await.is_err() {
                stuck.push(set_id);
            }
        }
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(ScheduleError::Unterminable { set_ids: stuck })
        }
    }

    /// Whether the queue is subscribed to the ticker.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether `set_id` is queued.
    pub fn contains(&self, set_id: &str) -> bool {
        self.entries.lock().iter().any(|e| e.set_id == set_id)
    }

    /// Instance behind `set_id`.
    pub fn instance(&self, set_id: &str) -> Option<Arc<ModuleInstance>> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.set_id == set_id)
            .map(|e| Arc::clone(&e.instance))
    }

    /// Hosts of `set_id`.
    pub fn hosts(&self, set_id: &str) -> Option<Vec<String>> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.set_id == set_id)
            .map(|e| e.hosts.clone())
    }

    /// Remaining countdown of `set_id`.
    pub fn countdown(&self, set_id: &str) -> Option<u64> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.set_id == set_id)
            .map(|e| e.countdown)
    }

    /// Overrides the remaining countdown of `set_id`, keeping the order invariant.
    pub(crate) fn set_countdown(&self, set_id: &str, countdown: u64) -> bool {
        let mut entries = self.entries.lock();
        let Some(at) = entries.iter().position(|e| e.set_id == set_id) else {
            return false;
        };
        let mut entry = entries.remove(at);
        entry.countdown = countdown;
        let at = entries
            .iter()
            .position(|e| e.countdown >= countdown)
            .unwrap_or(entries.len());
        entries.insert(at, entry);
        true
    }

    /// Set ids in current order.
    pub fn set_ids(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.set_id.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the queue has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Live runs across all members.
    pub fn live_workers(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|e| e.instance.live_workers())
            .sum()
    }

    /// Entries in current order.
    pub fn snapshot(&self) -> Vec<QueueEntrySnapshot> {
        self.entries
            .lock()
            .iter()
            .map(|e| QueueEntrySnapshot {
                module: e.instance.id().to_string(),
                set_id: e.set_id.clone(),
                params: e.instance.params(),
                hosts: e.hosts.clone(),
                countdown: e.countdown,
                initial: e.initial,
            })
            .collect()
    }
}

impl Decrement for Queue {
    fn is_decrementable(&self) -> bool {
        self.is_running()
    }

    fn decrement(&self) {
        let fired: Vec<(String, Arc<ModuleInstance>, Vec<String>)> = {
            let mut entries = self.entries.lock();
            let mut tagged: Vec<(bool, QueueEntry)> = entries
                .drain(..)
                .map(|mut e| {
                    e.countdown = e.countdown.saturating_sub(1);
                    let fire = e.countdown == 0;
                    if fire {
                        e.countdown = e.initial;
                    }
                    (fire, e)
                })
                .collect();
            let fired = tagged
                .iter()
                .filter(|(fire, _)| *fire)
                .map(|(_, e)| (e.set_id.clone(), Arc::clone(&e.instance), e.hosts.clone()))
                .collect();
            tagged.sort_by_key(|(fire, e)| (e.countdown, *fire));
            entries.extend(tagged.into_iter().map(|(_, e)| e));
            fired
        };

        for (set_id, instance, hosts) in fired {
            self.ctx.bus.publish(
                Event::new(EventKind::EntryFired)
                    .with_module(instance.id())
                    .with_set_id(set_id.as_str()),
            );
            if let Err(err) = instance.launch_now(&hosts) {
                self.ctx.bus.publish(
                    Event::new(EventKind::LaunchFailed)
                        .with_module(instance.id())
                        .with_set_id(set_id.as_str())
                        .with_reason(err.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::events::Bus;
    use crate::modules::builtin::CommandModule;
    use crate::modules::{MemorySink, Module, Params};
    use crate::process::testing::{Behavior, FakeLauncher};

    fn setup() -> (Arc<Queue>, Context, Arc<FakeLauncher>) {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let ctx = Context::new(
            Config::default(),
            Bus::new(256),
            Arc::new(MemorySink::new()),
            launcher.clone(),
        );
        (Queue::new(&ctx), ctx, launcher)
    }

    fn instance(ctx: &Context, id: &str, archetype: Archetype) -> Arc<ModuleInstance> {
        let module: Arc<dyn Module> = Arc::new(CommandModule::new(id, "true", archetype).with_timer(5));
        ModuleInstance::new(module, &Params::new(), ctx.clone()).unwrap()
    }

    #[tokio::test]
    async fn entry_fires_once_on_its_tick_and_resets() {
        let (q, ctx, launcher) = setup();
        q.add_module(instance(&ctx, "scan", Archetype::Active), AddOptions::default().countdown(3))
            .unwrap();

        q.decrement();
        q.decrement();
        assert_eq!(q.countdown("scan"), Some(1));
        assert_eq!(launcher.count(), 0);

        q.decrement();
        assert_eq!(q.countdown("scan"), Some(3));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(launcher.count(), 1);
    }

    #[tokio::test]
    async fn countdown_never_goes_below_zero_before_firing() {
        let (q, ctx, launcher) = setup();
        q.add_module(instance(&ctx, "scan", Archetype::Active), AddOptions::default().countdown(0))
            .unwrap();
        q.decrement();
        q.decrement();
        assert_eq!(q.countdown("scan"), Some(0));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(launcher.count(), 2);
    }

    #[test]
    fn rejects_passive_and_duplicates_without_mutation() {
        let (q, ctx, _) = setup();
        let mut rx = ctx.bus.subscribe();
        let err = q
            .add_module(instance(&ctx, "arp", Archetype::Passive), AddOptions::default())
            .unwrap_err();
        assert_eq!(err.as_label(), "schedule_archetype_mismatch");
        assert!(q.is_empty());
        let ev = rx.try_recv().expect("rejection event");
        assert_eq!((ev.kind, ev.module.as_deref()), (EventKind::EntryRejected, Some("arp")));

        let scan = instance(&ctx, "scan", Archetype::Active);
        q.add_module(scan.clone(), AddOptions::default()).unwrap();
        let err = q.add_module(scan, AddOptions::default()).unwrap_err();
        assert_eq!(err.as_label(), "schedule_duplicate_module");

        let err = q
            .add_module(instance(&ctx, "other", Archetype::Active), AddOptions::default().set_id("scan"))
            .unwrap_err();
        assert_eq!(err.as_label(), "schedule_duplicate_set_id");
        assert_eq!(q.set_ids(), vec!["scan"]);
    }

    #[test]
    fn equal_configurations_are_distinct_entries() {
        let (q, ctx, _) = setup();
        let a = q.add_module(instance(&ctx, "scan", Archetype::Active), AddOptions::default()).unwrap();
        let b = q.add_module(instance(&ctx, "scan", Archetype::Active), AddOptions::default()).unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("scan", "scan1"));
    }

    #[tokio::test]
    async fn ties_put_newcomers_first_and_fired_entries_last() {
        let (q, ctx, _) = setup();
        q.add_module(instance(&ctx, "a", Archetype::Active), AddOptions::default().countdown(2))
            .unwrap();
        q.add_module(instance(&ctx, "b", Archetype::Active), AddOptions::default().countdown(2))
            .unwrap();
        assert_eq!(q.set_ids(), vec!["b", "a"]);

        q.add_module(instance(&ctx, "c", Archetype::Active), AddOptions::default().countdown(1))
            .unwrap();
        q.add_module(instance(&ctx, "d", Archetype::Active), AddOptions::default().countdown(3))
            .unwrap();
        // c: 1 → fires, back to 1; b, a: 1; d: 2
        q.decrement();
        assert_eq!(q.set_ids(), vec!["b", "a", "c", "d"]);
    }

    #[tokio::test]
    async fn resume_is_idempotent_and_pause_unsubscribes() {
        let (q, ctx, _) = setup();
        q.resume();
        q.resume();
        assert!(q.is_running());
        assert_eq!(ctx.ticker.subscriber_count(), 1);

        q.pause(false).await.unwrap();
        assert!(!q.is_running());
        assert_eq!(ctx.ticker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn remove_unknown_set_id_fails() {
        let (q, _, _) = setup();
        let err = q.remove_module("ghost").await.unwrap_err();
        assert_eq!(err.as_label(), "schedule_unknown_set_id");
    }
}
