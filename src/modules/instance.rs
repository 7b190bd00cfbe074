//! # Module instance: definition + resolved parameters + executor.
//!
//! The executor is picked from the module's [`Archetype`] at construction:
//! - `Active`  → supervisor registry; `launch_now` is synchronous and safe from a tick
//! - `Passive` → background/communicator pairs; `launch` awaits the output pipe
//!
//! Instances are shared as `Arc<ModuleInstance>`; schedulers compare them by
//! identity, never by configuration.
//!
//! Passive `launch` and every `stop` hold the instance's lifecycle lock: a stop
//! issued while a launch waits for its output pipe runs once that launch has
//! registered its workers, and terminates them.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ModuleError;
use crate::modules::active::ActiveExecutor;
use crate::modules::passive::PassiveExecutor;
use crate::modules::{Archetype, Context, Module, Params};
use crate::process::{CommandLine, ProcessHandle};

enum Executor {
    Active(ActiveExecutor),
    Passive(PassiveExecutor),
}

/// A configured module ready to be scheduled.
pub struct ModuleInstance {
    module: Arc<dyn Module>,
    params: Mutex<Params>,
    ctx: Context,
    executor: Executor,
    lifecycle: tokio::sync::Mutex<()>,
}

impl ModuleInstance {
    /// Resolves `partial` against the module's scheme and builds the matching executor.
    pub fn new(
        module: Arc<dyn Module>,
        partial: &Params,
        ctx: Context,
    ) -> Result<Arc<Self>, ModuleError> {
        let params = module.scheme().resolve(module.id(), partial)?;
        let executor = match module.archetype() {
            Archetype::Active => Executor::Active(ActiveExecutor::default()),
            Archetype::Passive => Executor::Passive(PassiveExecutor::default()),
        };
        Ok(Arc::new(Self {
            module,
            params: Mutex::new(params),
            ctx,
            executor,
            lifecycle: tokio::sync::Mutex::new(()),
        }))
    }

    /// Module id.
    pub fn id(&self) -> &str {
        self.module.id()
    }

    /// Module definition.
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Execution archetype.
    pub fn archetype(&self) -> Archetype {
        self.module.archetype()
    }

    /// Copy of the current (fully resolved) parameters.
    pub fn params(&self) -> Params {
        self.params.lock().clone()
    }

    /// Command line for the current parameters and `hosts`.
    pub fn build_command(&self, hosts: &[String]) -> CommandLine {
        let params = self.params.lock();
        self.module.build_command(&params, hosts)
    }

    /// Resolves `update` on top of the current values without applying it.
    pub fn resolve_update(&self, update: &Params) -> Result<Params, ModuleError> {
        let mut merged = self.params();
        merged.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.module.scheme().resolve(self.module.id(), &merged)
    }

    /// Replaces the current values with `update` applied on top.
    ///
    /// Nothing changes when the update does not resolve.
    pub fn set_params(&self, update: &Params) -> Result<(), ModuleError> {
        let resolved = self.resolve_update(update)?;
        *self.params.lock() = resolved;
        Ok(())
    }

    pub(crate) fn replace_params(&self, resolved: Params) {
        *self.params.lock() = resolved;
    }

    /// Starts one active run without waiting for it.
    ///
    /// Must be called within a tokio runtime. Fails with
    /// [`ModuleError::NotActive`] on passive instances.
    pub fn launch_now(&self, hosts: &[String]) -> Result<(), ModuleError> {
        let Executor::Active(exec) = &self.executor else {
            return Err(ModuleError::NotActive(self.id().to_string()));
        };
        exec.launch(
            Arc::clone(&self.module),
            self.build_command(hosts),
            hosts.to_vec(),
            self.ctx.clone(),
        );
        Ok(())
    }

    /// Launches one execution of either archetype.
    ///
    /// Active: returns as soon as the run is scheduled. Passive: returns once
    /// the process output is available and its communicator is ticking.
    pub async fn launch(&self, hosts: &[String]) -> Result<(), ModuleError> {
        match &self.executor {
            Executor::Active(_) => self.launch_now(hosts),
            Executor::Passive(exec) => {
                let _lifecycle = self.lifecycle.lock().await;
                let command = self.build_command(hosts);
                exec.launch(Arc::clone(&self.module), command, hosts.to_vec(), &self.ctx)
                    .await
            }
        }
    }

    /// Terminates every live execution.
    ///
    /// Active instances interrupt each process once; passive instances retry
    /// and fail with [`ModuleError::Unterminable`] when workers survive.
    pub async fn stop(&self) -> Result<(), ModuleError> {
        let _lifecycle = self.lifecycle.lock().await;
        match &self.executor {
            Executor::Active(exec) => {
                exec.stop(self.id(), &self.ctx).await;
                Ok(())
            }
            Executor::Passive(exec) => exec.stop(self.id(), &self.ctx).await,
        }
    }

    /// Number of live executions (runs in flight, surviving processes, reading pairs).
    pub fn live_workers(&self) -> usize {
        match &self.executor {
            Executor::Active(exec) => exec.live(),
            Executor::Passive(exec) => exec.live(),
        }
    }

    /// Whether any execution is live.
    pub fn is_running(&self) -> bool {
        self.live_workers() > 0
    }

    /// Handles of the processes this instance spawned and still tracks.
    pub fn processes(&self) -> Vec<Arc<ProcessHandle>> {
        match &self.executor {
            Executor::Active(exec) => exec.processes(),
            Executor::Passive(exec) => exec.processes(),
        }
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id())
            .field("archetype", &self.archetype())
            .field("params", &*self.params.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::events::{Bus, EventKind};
    use crate::modules::builtin::CommandModule;
    use crate::modules::{Finding, MemorySink, ParamSpec};
    use crate::policies::RetryPolicy;
    use crate::process::testing::{Behavior, FakeLauncher};

    fn ctx(launcher: Arc<FakeLauncher>, sink: Arc<MemorySink>) -> Context {
        let cfg = Config {
            term_grace: Duration::from_millis(20),
            drain_bound: Duration::from_millis(50),
            spawn_wait: RetryPolicy::fixed(3, Duration::from_millis(10)),
            interrupt: RetryPolicy::fixed(2, Duration::from_millis(10)),
            ..Config::default()
        };
        Context::new(cfg, Bus::new(256), sink, launcher)
    }

    fn scan() -> Arc<dyn Module> {
        Arc::new(
            CommandModule::new("scan", "nmap", Archetype::Active)
                .param(ParamSpec::value("ports", "-p").default_value("22"))
                .with_max_duration(2),
        )
    }

    fn listen() -> Arc<dyn Module> {
        Arc::new(CommandModule::new("listen", "tcpdump", Archetype::Passive).with_read_interval(1))
    }

    #[test]
    fn failed_update_leaves_params_untouched() {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let inst = ModuleInstance::new(scan(), &Params::new(), ctx(launcher, Arc::default())).unwrap();
        let bad: Params = [("colour".to_string(), "red".to_string())].into();
        assert!(inst.set_params(&bad).is_err());
        assert_eq!(inst.params()["ports"], "22");

        let good: Params = [("ports".to_string(), "80".to_string())].into();
        inst.set_params(&good).unwrap();
        assert_eq!(inst.build_command(&["10.0.0.1".into()]).to_string(), "nmap -p 80 10.0.0.1");
    }

    #[tokio::test]
    async fn passive_instance_refuses_launch_now() {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let inst = ModuleInstance::new(listen(), &Params::new(), ctx(launcher, Arc::default())).unwrap();
        let err = inst.launch_now(&[]).unwrap_err();
        assert_eq!(err.as_label(), "module_not_active");
    }

    #[tokio::test]
    async fn active_run_parses_output_on_exit() {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let sink = Arc::new(MemorySink::new());
        let inst = ModuleInstance::new(scan(), &Params::new(), ctx(launcher.clone(), sink.clone())).unwrap();

        inst.launch_now(&["10.0.0.9".into()]).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(launcher.count(), 1);
        assert_eq!(inst.live_workers(), 1);

        let fake = &launcher.launched()[0];
        fake.finish_output(b"10.0.0.9 up\n");
        fake.exit(0);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(inst.live_workers(), 0);
        assert_eq!(
            sink.findings(),
            vec![("scan".to_string(), Finding::Line { line: "10.0.0.9 up".into() })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_without_killing() {
        let launcher = FakeLauncher::new(Behavior::Obedient);
        let c = ctx(launcher.clone(), Arc::default());
        let mut rx = c.bus.subscribe();
        let inst = ModuleInstance::new(scan(), &Params::new(), c).unwrap();

        inst.launch_now(&[]).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::ModuleTimedOut));
        assert_eq!(launcher.alive(), 1);
        assert!(inst.processes()[0].is_alive());

        launcher.launched()[0].output.append(b"late line\n");
        assert!(inst.processes()[0].output().is_empty());

        inst.stop().await.unwrap();
        assert_eq!(launcher.alive(), 0);
        assert_eq!(inst.live_workers(), 0);
    }

    #[tokio::test]
    async fn passive_launch_surfaces_spawn_errors() {
        let launcher = FakeLauncher::new(Behavior::Broken);
        let inst = ModuleInstance::new(listen(), &Params::new(), ctx(launcher, Arc::default())).unwrap();
        let err = inst.launch(&[]).await.unwrap_err();
        assert_eq!(err.as_label(), "module_spawn");
        assert_eq!(inst.live_workers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_passive_stop_gives_up() {
        let launcher = FakeLauncher::new(Behavior::Stubborn);
        let c = ctx(launcher.clone(), Arc::default());
        let mut rx = c.bus.subscribe();
        let inst = ModuleInstance::new(listen(), &Params::new(), c).unwrap();

        inst.launch(&[]).await.unwrap();
        assert_eq!(inst.live_workers(), 1);

        let err = inst.stop().await.unwrap_err();
        assert_eq!(err.as_label(), "module_unterminable");

        let attempts = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::InterruptRequested)
            .count();
        assert_eq!(attempts, 2);
        assert_eq!(launcher.alive(), 1);
    }
}
