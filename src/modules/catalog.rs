//! # Catalog: module definitions by id.
//!
//! Used to instantiate modules by name (front-ends, snapshot restore).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ScheduleError;
use crate::modules::builtin::{ArpWatch, NmapDiscovery, PingSweep};
use crate::modules::{Context, Module, ModuleInstance, Params};

/// Registry of known module definitions.
#[derive(Clone, Default)]
pub struct Catalog {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl Catalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in modules.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(PingSweep::new()));
        catalog.register(Arc::new(NmapDiscovery::new()));
        catalog.register(Arc::new(ArpWatch::new()));
        catalog
    }

    /// Registers a definition, returning the one it replaced.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Option<Arc<dyn Module>> {
        self.modules.insert(module.id().to_string(), module)
    }

    /// Looks up a definition.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Creates a new instance of module `id` with `params`.
    pub fn instantiate(
        &self,
        id: &str,
        params: &Params,
        ctx: Context,
    ) -> Result<Arc<ModuleInstance>, ScheduleError> {
        let module = self
            .get(id)
            .ok_or_else(|| ScheduleError::UnknownModule(id.to_string()))?;
        Ok(ModuleInstance::new(module, params, ctx)?)
    }
}
