//! # Panel: scheduler for passive instances.
//!
//! Members are started together by `resume()` and run until `pause(true)`.
//! The panel itself never subscribes to the ticker; each member's
//! communicators do.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::ScheduleError;
use crate::events::{Event, EventKind};
use crate::modules::{Archetype, Context, ModuleInstance};
use crate::schedule::snapshot::PanelEntrySnapshot;
use crate::schedule::{AddOptions, unique_set_id};

struct PanelEntry {
    set_id: String,
    instance: Arc<ModuleInstance>,
    hosts: Vec<String>,
}

/// Passive-module scheduler.
pub struct Panel {
    ctx: Context,
    running: AtomicBool,
    entries: Mutex<Vec<PanelEntry>>,
}

impl Panel {
    /// Creates a paused, empty panel.
    pub fn new(ctx: &Context) -> Arc<Self> {
        Arc::new(Self {
            ctx: ctx.clone(),
            running: AtomicBool::new(false),
            entries: Mutex::new(Vec::new()),
        })
    }

    /// Adds a passive instance and returns its set id.
    ///
    /// A running panel launches the newcomer right away; a failed launch is
    /// reported on the bus and leaves the entry in place.
    pub async fn add_module(
        &self,
        instance: Arc<ModuleInstance>,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        let hosts = opts.hosts.clone();
        let module = instance.id().to_string();
        let set_id = match self.insert(Arc::clone(&instance), opts) {
            Ok(set_id) => set_id,
            Err(err) => {
                self.ctx.bus.publish(
                    Event::new(EventKind::EntryRejected)
                        .with_module(module)
                        .with_reason(err.to_string()),
                );
                return Err(err);
            }
        };
        self.ctx.bus.publish(
            Event::new(EventKind::EntryAdded)
                .with_module(instance.id())
                .with_set_id(set_id.as_str())
                .with_reason("panel"),
        );

        if self.is_running() {
            self.launch_member(&set_id, &instance, &hosts).await;
        }
        Ok(set_id)
    }

    fn insert(
        &self,
        instance: Arc<ModuleInstance>,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        if instance.archetype() != Archetype::Passive {
            return Err(ScheduleError::ArchetypeMismatch {
                module: instance.id().to_string(),
                expected: Archetype::Passive,
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
        entries.push(PanelEntry {
            set_id: set_id.clone(),
            instance,
            hosts: opts.hosts,
        });
        Ok(set_id)
    }

    /// Launches one member unless the panel was paused in the meantime.
    ///
    /// A pause landing while the launch waits for its output pipe is honored
    /// once the launch returns: the fresh workers are stopped again.
    async fn launch_member(&self, set_id: &str, instance: &ModuleInstance, hosts: &[String]) {
        if !self.is_running() {
            return;
        }
        if let Err(err) = instance.launch(hosts).await {
            self.ctx.bus.publish(
                Event::new(EventKind::LaunchFailed)
                    .with_module(instance.id())
                    .with_set_id(set_id)
                    .with_reason(err.to_string()),
            );
        }
        if !self.is_running() {
            let _ = instance.stop().await;
        }
    }

    fn members(&self) -> Vec<(String, Arc<ModuleInstance>, Vec<String>)> {
        self.entries
            .lock()
            .iter()
            .map(|e| (e.set_id.clone(), Arc::clone(&e.instance), e.hosts.clone()))
            .collect()
    }

    /// Launches every member. No-op when already running.
    pub async fn resume(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ctx
            .bus
            .publish(Event::new(EventKind::SchedulerResumed).with_reason("panel"));
        for (set_id, instance, hosts) in self.members() {
            self.launch_member(&set_id, &instance, &hosts).await;
        }
    }

    /// Marks the panel paused; with `kill`, stops every member.
    ///
    /// Members that survive interruption are reported together in
    /// [`ScheduleError::Unterminable`].
    pub async fn pause(&self, kill: bool) -> Result<(), ScheduleError> {
        if self.running.swap(false, Ordering::SeqCst) {
            self.ctx
                .bus
                .publish(Event::new(EventKind::SchedulerPaused).with_reason("panel"));
        }
        if !kill {
            return Ok(());
        }

        let mut stuck = Vec::new();
        for (set_id, instance, _) in self.members() {
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

    /// Whether the panel is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether `set_id` is a member.
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

    /// Set ids in insertion order.
    pub fn set_ids(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.set_id.clone()).collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the panel has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Live background/communicator pairs across all members.
    pub fn live_workers(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|e| e.instance.live_workers())
            .sum()
    }

    /// Members in insertion order.
    pub fn snapshot(&self) -> Vec<PanelEntrySnapshot> {
        self.entries
            .lock()
            .iter()
            .map(|e| PanelEntrySnapshot {
                module: e.instance.id().to_string(),
                set_id: e.set_id.clone(),
                params: e.instance.params(),
                hosts: e.hosts.clone(),
                read_interval: e.instance.module().read_interval(),
            })
            .collect()
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
    use crate::policies::RetryPolicy;
    use crate::process::testing::{Behavior, FakeLauncher};

    fn setup(behavior: Behavior) -> (Arc<Panel>, Context, Arc<FakeLauncher>) {
        let launcher = FakeLauncher::new(behavior);
        let cfg = Config {
            term_grace: Duration::from_millis(20),
            spawn_wait: RetryPolicy::fixed(5, Duration::from_millis(5)),
            interrupt: RetryPolicy::fixed(3, Duration::from_millis(5)),
            ..Config::default()
        };
        let ctx = Context::new(cfg, Bus::new(256), Arc::new(MemorySink::new()), launcher.clone());
        (Panel::new(&ctx), ctx, launcher)
    }

    fn listener(ctx: &Context, id: &str) -> Arc<ModuleInstance> {
        let module: Arc<dyn Module> = Arc::new(CommandModule::new(id, "tcpdump", Archetype::Passive));
        ModuleInstance::new(module, &Params::new(), ctx.clone()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn resume_twice_spawns_once_and_pause_kills() {
        let (panel, ctx, launcher) = setup(Behavior::Obedient);
        panel.add_module(listener(&ctx, "arp"), AddOptions::default()).await.unwrap();
        assert_eq!(launcher.count(), 0);

        panel.resume().await;
        panel.resume().await;
        assert_eq!(launcher.count(), 1);
        assert_eq!(panel.live_workers(), 1);
        assert_eq!(ctx.ticker.subscriber_count(), 1);

        panel.pause(true).await.unwrap();
        assert!(!panel.is_running());
        assert_eq!(panel.live_workers(), 0);
        assert_eq!(ctx.ticker.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn running_panel_launches_newcomers() {
        let (panel, ctx, launcher) = setup(Behavior::Obedient);
        panel.resume().await;
        let id = panel.add_module(listener(&ctx, "arp"), AddOptions::default()).await.unwrap();
        assert_eq!(id, "arp");
        assert_eq!(launcher.count(), 1);
        panel.pause(true).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_during_resume_stops_members_still_launching() {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let cfg = Config {
            term_grace: Duration::from_millis(20),
            spawn_wait: RetryPolicy::fixed(5, Duration::from_millis(100)),
            interrupt: RetryPolicy::fixed(3, Duration::from_millis(5)),
            ..Config::default()
        };
        let ctx = Context::new(cfg, Bus::new(256), Arc::new(MemorySink::new()), launcher.clone());
        let panel = Panel::new(&ctx);
        panel.add_module(listener(&ctx, "arp"), AddOptions::default()).await.unwrap();
        panel.add_module(listener(&ctx, "dhcp"), AddOptions::default()).await.unwrap();

        let resuming = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.resume().await }
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        panel.pause(true).await.unwrap();
        resuming.await.expect("resume task");

        assert!(!panel.is_running());
        assert_eq!(panel.live_workers(), 0);
        assert_eq!(launcher.alive(), 0);
        assert_eq!(ctx.ticker.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unterminable_members_are_reported_by_set_id() {
        let (panel, ctx, _) = setup(Behavior::Stubborn);
        panel.add_module(listener(&ctx, "arp"), AddOptions::default()).await.unwrap();
        panel.resume().await;

        match panel.pause(true).await {
            Err(ScheduleError::Unterminable { set_ids }) => assert_eq!(set_ids, vec!["arp"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(panel.live_workers(), 1);
    }

    #[tokio::test]
    async fn rejects_active_instances() {
        let (panel, ctx, _) = setup(Behavior::Obedient);
        let mut rx = ctx.bus.subscribe();
        let module: Arc<dyn Module> = Arc::new(CommandModule::new("scan", "nmap", Archetype::Active));
        let inst = ModuleInstance::new(module, &Params::new(), ctx.clone()).unwrap();
        let err = panel.add_module(inst, AddOptions::default()).await.unwrap_err();
        assert_eq!(err.as_label(), "schedule_archetype_mismatch");
        assert!(panel.is_empty());

        let ev = rx.try_recv().expect("rejection event");
        assert_eq!(ev.kind, EventKind::EntryRejected);
        assert_eq!(ev.module.as_deref(), Some("scan"));
    }
}
