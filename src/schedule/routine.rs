//! # Routine: one queue + one panel behind a single pause/resume surface.
//!
//! ## Rules
//! - Instances go to the queue (Active) or the panel (Passive), never both.
//! - Set ids are unique across both schedulers; any collision, including one
//!   on an explicitly requested id, is resolved by suffixing.
//! - Running = queue running OR panel running.
//! - Default pause kills panel workers (they never end on their own) and lets
//!   in-flight queue runs finish. `stop()` kills both.
//!
//! ## State
//! ```text
//!            resume()                   pause()/stop()
//! Paused ───────────────► Running ───────────────────► Paused
//!            (per scheduler, skipped when already running)
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ScheduleError;
use crate::modules::{Archetype, Catalog, Context, ModuleInstance, Params};
use crate::schedule::snapshot::RoutineSnapshot;
use crate::schedule::{AddOptions, Panel, Queue, unique_set_id};

/// Which schedulers `pause` should kill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PauseOptions {
    /// Stop every panel member.
    pub kill_panel: bool,
    /// Stop every queue member's in-flight runs.
    pub kill_queue: bool,
}

impl Default for PauseOptions {
    fn default() -> Self {
        Self {
            kill_panel: true,
            kill_queue: false,
        }
    }
}

/// Target of front-end pause/resume requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Queue and panel.
    Routine,
    /// Panel only.
    Panel,
    /// Queue only.
    Queue,
}

/// Composition of a [`Queue`] and a [`Panel`].
pub struct Routine {
    ctx: Context,
    queue: Arc<Queue>,
    panel: Arc<Panel>,
    admission: Mutex<()>,
}

impl Routine {
    /// Creates a paused, empty routine.
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            queue: Queue::new(ctx),
            panel: Panel::new(ctx),
            admission: Mutex::new(()),
        }
    }

    /// The active-module scheduler.
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// The passive-module scheduler.
    pub fn panel(&self) -> &Arc<Panel> {
        &self.panel
    }

    /// Whether `set_id` is taken in either scheduler.
    pub fn contains(&self, set_id: &str) -> bool {
        self.queue.contains(set_id) || self.panel.contains(set_id)
    }

    /// Adds an instance to the scheduler matching its archetype.
    ///
    /// Returns the final set id.
    pub async fn add_module(
        &self,
        instance: Arc<ModuleInstance>,
        opts: AddOptions,
    ) -> Result<String, ScheduleError> {
        let _admission = self.admission.lock().await;

        let base = opts
            .set_id
            .clone()
            .unwrap_or_else(|| instance.id().to_string());
        let set_id = unique_set_id(&base, |id| self.contains(id));
        let opts = AddOptions {
            set_id: Some(set_id),
            ..opts
        };
        match instance.archetype() {
            Archetype::Active => self.queue.add_module(instance, opts),
            Archetype::Passive => self.panel.add_module(instance, opts).await,
        }
    }

    /// Stops and removes the entry `set_id`.
    pub async fn remove_module(&self, set_id: &str) -> Result<Arc<ModuleInstance>, ScheduleError> {
        if self.queue.contains(set_id) {
            self.queue.remove_module(set_id).await
        } else if self.panel.contains(set_id) {
            self.panel.remove_module(set_id).await
        } else {
            Err(ScheduleError::UnknownSetId(set_id.to_string()))
        }
    }

    /// Applies `update` to the parameters of `set_id`.
    ///
    /// The update is resolved first; on failure nothing is stopped or changed.
    /// The member is then stopped, reconfigured and relaunched when its
    /// scheduler is running and it is passive or had live runs.
    pub async fn change_module_params(
        &self,
        set_id: &str,
        update: &Params,
    ) -> Result<(), ScheduleError> {
        let (instance, hosts, owner_running) = if let Some(inst) = self.queue.instance(set_id) {
            let hosts = self.queue.hosts(set_id).unwrap_or_default();
            (inst, hosts, self.queue.is_running())
        } else if let Some(inst) = self.panel.instance(set_id) {
            let hosts = self.panel.hosts(set_id).unwrap_or_default();
            (inst, hosts, self.panel.is_running())
        } else {
            return Err(ScheduleError::UnknownSetId(set_id.to_string()));
        };

        let resolved = instance.resolve_update(update)?;
        let had_runs = instance.is_running();
        instance.stop().await?;
        instance.replace_params(resolved);

        if owner_running && (instance.archetype() == Archetype::Passive || had_runs) {
            instance.launch(&hosts).await?;
        }
        Ok(())
    }

    /// Resumes every scheduler that is not running.
    pub async fn resume(&self) {
        if !self.queue.is_running() {
            self.queue.resume();
        }
        if !self.panel.is_running() {
            self.panel.resume().await;
        }
    }

    /// Pauses both schedulers with independent kill flags.
    pub async fn pause(&self, opts: PauseOptions) -> Result<(), ScheduleError> {
        let queue = self.queue.pause(opts.kill_queue).await;
        let panel = self.panel.pause(opts.kill_panel).await;
        merge(queue, panel)
    }

    /// Pauses and kills everything.
    pub async fn stop(&self) -> Result<(), ScheduleError> {
        self.pause(PauseOptions {
            kill_panel: true,
            kill_queue: true,
        })
        .await
    }

    /// Front-end pause with default kill flags per target.
    pub async fn pause_it(&self, target: Target) -> Result<(), ScheduleError> {
        let opts = PauseOptions::default();
        match target {
            Target::Routine => self.pause(opts).await,
            Target::Panel => self.panel.pause(opts.kill_panel).await,
            Target::Queue => self.queue.pause(opts.kill_queue).await,
        }
    }

    /// Front-end resume.
    pub async fn resume_it(&self, target: Target) {
        match target {
            Target::Routine => self.resume().await,
            Target::Panel => self.panel.resume().await,
            Target::Queue => self.queue.resume(),
        }
    }

    /// Queue running OR panel running.
    pub fn is_running(&self) -> bool {
        self.queue.is_running() || self.panel.is_running()
    }

    /// Live executions across both schedulers.
    pub fn live_workers(&self) -> usize {
        self.queue.live_workers() + self.panel.live_workers()
    }

    /// Set ids whose instance still has live executions.
    pub fn live_set_ids(&self) -> Vec<String> {
        let queue = self.queue.set_ids().into_iter().map(|id| (self.queue.instance(&id), id));
        let panel = self.panel.set_ids().into_iter().map(|id| (self.panel.instance(&id), id));
        queue
            .chain(panel)
            .filter(|(inst, _)| inst.as_ref().is_some_and(|i| i.is_running()))
            .map(|(_, id)| id)
            .collect()
    }

    /// Serializable state of both schedulers.
    pub fn snapshot(&self) -> RoutineSnapshot {
        RoutineSnapshot {
            queue: self.queue.snapshot(),
            panel: self.panel.snapshot(),
        }
    }

    /// Re-creates the entries of `snapshot` through `catalog`.
    ///
    /// Every entry is instantiated before any is added, so an unknown module or
    /// invalid parameter leaves the routine untouched. Restored entries keep
    /// their set ids unless they collide with existing ones.
    pub async fn restore(
        &self,
        snapshot: &RoutineSnapshot,
        catalog: &Catalog,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut queued = Vec::with_capacity(snapshot.queue.len());
        for entry in &snapshot.queue {
            let inst = catalog.instantiate(&entry.module, &entry.params, self.ctx.clone())?;
            queued.push((inst, entry));
        }
        let mut paneled = Vec::with_capacity(snapshot.panel.len());
        for entry in &snapshot.panel {
            let inst = catalog.instantiate(&entry.module, &entry.params, self.ctx.clone())?;
            paneled.push((inst, entry));
        }

        let mut set_ids = Vec::new();
        for (inst, entry) in queued {
            let opts = AddOptions {
                countdown: Some(entry.initial),
                set_id: Some(entry.set_id.clone()),
                hosts: entry.hosts.clone(),
            };
            let set_id = self.add_module(inst, opts).await?;
            self.queue.set_countdown(&set_id, entry.countdown);
            set_ids.push(set_id);
        }
        for (inst, entry) in paneled {
            let opts = AddOptions {
                countdown: None,
                set_id: Some(entry.set_id.clone()),
                hosts: entry.hosts.clone(),
            };
            set_ids.push(self.add_module(inst, opts).await?);
        }
        Ok(set_ids)
    }
}

fn merge(
    queue: Result<(), ScheduleError>,
    panel: Result<(), ScheduleError>,
) -> Result<(), ScheduleError> {
    match (queue, panel) {
        (Ok(()), Ok(())) => Ok(()),
        (
            Err(ScheduleError::Unterminable { set_ids: mut a }),
            Err(ScheduleError::Unterminable { set_ids: b }),
        ) => {
            a.extend(b);
            Err(ScheduleError::Unterminable { set_ids: a })
        }
        (Err(err), _) | (Ok(()), Err(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::events::Bus;
    use crate::modules::builtin::CommandModule;
    use crate::modules::{MemorySink, Module, ParamSpec};
    use crate::policies::RetryPolicy;
    use crate::process::testing::{Behavior, FakeLauncher};

    fn setup() -> (Routine, Context, Arc<FakeLauncher>) {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let cfg = Config {
            term_grace: Duration::from_millis(20),
            spawn_wait: RetryPolicy::fixed(5, Duration::from_millis(5)),
            interrupt: RetryPolicy::fixed(2, Duration::from_millis(5)),
            ..Config::default()
        };
        let ctx = Context::new(cfg, Bus::new(256), Arc::new(MemorySink::new()), launcher.clone());
        (Routine::new(&ctx), ctx, launcher)
    }

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        c.register(Arc::new(
            CommandModule::new("scan", "nmap", Archetype::Active)
                .param(ParamSpec::value("ports", "-p").default_value("22"))
                .with_timer(4),
        ));
        c.register(Arc::new(CommandModule::new("arp", "tcpdump", Archetype::Passive)));
        c
    }

    fn instance(ctx: &Context, id: &str) -> Arc<ModuleInstance> {
        catalog().instantiate(id, &Params::new(), ctx.clone()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn set_ids_are_unique_across_queue_and_panel() {
        let (routine, ctx, _) = setup();
        let a = routine.add_module(instance(&ctx, "scan"), AddOptions::default()).await.unwrap();
        let b = routine.add_module(instance(&ctx, "scan"), AddOptions::default()).await.unwrap();
        let c = routine
            .add_module(instance(&ctx, "arp"), AddOptions::default().set_id("scan"))
            .await
            .unwrap();
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("scan", "scan1", "scan2"));
        assert_eq!(routine.queue().len(), 2);
        assert_eq!(routine.panel().set_ids(), vec!["scan2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn default_pause_kills_panel_only() {
        let (routine, ctx, _) = setup();
        routine.add_module(instance(&ctx, "arp"), AddOptions::default()).await.unwrap();
        routine.add_module(instance(&ctx, "scan"), AddOptions::default()).await.unwrap();

        routine.resume().await;
        routine.resume().await;
        assert!(routine.is_running());
        assert_eq!(routine.panel().live_workers(), 1);
        // queue + one communicator
        assert_eq!(ctx.ticker.subscriber_count(), 2);

        routine.pause_it(Target::Routine).await.unwrap();
        assert!(!routine.is_running());
        assert_eq!(routine.live_workers(), 0);
        assert_eq!(ctx.ticker.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn change_params_relaunches_passive_members() {
        let (routine, ctx, launcher) = setup();
        let id = routine.add_module(instance(&ctx, "arp"), AddOptions::default()).await.unwrap();
        routine.resume_it(Target::Panel).await;
        assert_eq!(launcher.count(), 1);

        let bad: Params = [("colour".to_string(), "red".to_string())].into();
        let err = routine.change_module_params(&id, &bad).await.unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Module(crate::error::ModuleError::UnknownParam { .. })
        ));
        assert_eq!(launcher.alive(), 1);

        routine.change_module_params(&id, &Params::new()).await.unwrap();
        assert_eq!(launcher.count(), 2);
        assert_eq!(launcher.alive(), 1);
        routine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn change_params_does_not_launch_idle_active_members() {
        let (routine, ctx, launcher) = setup();
        let id = routine.add_module(instance(&ctx, "scan"), AddOptions::default()).await.unwrap();
        routine.resume_it(Target::Queue).await;

        let update: Params = [("ports".to_string(), "443".to_string())].into();
        routine.change_module_params(&id, &update).await.unwrap();
        assert_eq!(launcher.count(), 0);
        let snap = routine.snapshot();
        assert_eq!(snap.queue[0].params["ports"], "443");
        routine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_restores_into_an_equivalent_routine() {
        let (routine, ctx, _) = setup();
        routine
            .add_module(instance(&ctx, "scan"), AddOptions::hosts(["10.0.0.0/24"]).countdown(4))
            .await
            .unwrap();
        routine.add_module(instance(&ctx, "arp"), AddOptions::default()).await.unwrap();
        routine.queue().set_countdown("scan", 2);

        let snap = routine.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: RoutineSnapshot = serde_json::from_str(&json).unwrap();

        let (copy, _, _) = setup();
        let ids = copy.restore(&back, &catalog()).await.unwrap();
        assert_eq!(ids, vec!["scan", "arp"]);
        assert_eq!(copy.snapshot(), snap);
    }

    #[tokio::test]
    async fn restore_with_unknown_module_changes_nothing() {
        let (routine, _, _) = setup();
        let mut snap = RoutineSnapshot::default();
        snap.panel.push(crate::schedule::PanelEntrySnapshot {
            module: "ghost".into(),
            set_id: "ghost".into(),
            params: Params::new(),
            hosts: vec![],
            read_interval: 10,
        });
        let err = routine.restore(&snap, &catalog()).await.unwrap_err();
        assert_eq!(err.as_label(), "schedule_unknown_module");
        assert!(routine.panel().is_empty());
    }

    #[test]
    fn merge_collects_both_unterminable_lists() {
        let q = Err(ScheduleError::Unterminable { set_ids: vec!["scan".into()] });
        let p = Err(ScheduleError::Unterminable { set_ids: vec!["arp".into()] });
        match merge(q, p) {
            Err(ScheduleError::Unterminable { set_ids }) => assert_eq!(set_ids, vec!["scan", "arp"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
