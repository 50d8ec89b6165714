use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::module::AsyncModule;
use crate::modules::aggregator::AggregatorModule;
use crate::modules::file::FileModule;
use crate::modules::http::HttpModule;

// ---------------------------------------------------------------------------
// ModuleCatalog
// ---------------------------------------------------------------------------

/// Produces a fresh module instance for one compiled tree.
pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn AsyncModule> + Send + Sync>;

/// Name -> factory map of the transport modules a builder may load.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in transports: `http`, `file`, `aggregator`, and `mysql`
    /// when that feature is enabled.
    #[must_use]
    pub fn standard() -> Self {
        Self::standard_with(HttpConfig::default())
    }

    #[must_use]
    pub fn standard_with(http: HttpConfig) -> Self {
        let catalog = Self::new()
            .with_factory(HttpModule::NAME, move || {
                Arc::new(HttpModule::new(&http)) as Arc<dyn AsyncModule>
            })
            .with_factory(FileModule::NAME, || Arc::new(FileModule) as Arc<dyn AsyncModule>)
            .with_factory(AggregatorModule::NAME, || {
                Arc::new(AggregatorModule::new()) as Arc<dyn AsyncModule>
            });
        #[cfg(feature = "mysql")]
        let catalog = catalog.with_factory(crate::modules::mysql::MysqlModule::NAME, || {
            Arc::new(crate::modules::mysql::MysqlModule::new(
                &crate::config::MysqlConfig::from_env(),
            )) as Arc<dyn AsyncModule>
        });
        catalog
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn AsyncModule> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn with_factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn AsyncModule> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Registers a shared instance under its own name. Every compiled tree
    /// loading the name gets the same instance.
    #[must_use]
    pub fn with_instance(self, module: Arc<dyn AsyncModule>) -> Self {
        let name = module.name().to_string();
        self.with_factory(name, move || Arc::clone(&module))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn factory(&self, name: &str) -> Option<&ModuleFactory> {
        self.factories.get(name)
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// Per-tree cache of loaded modules.
///
/// Each name is instantiated at most once. Load order is kept so shutdown
/// visits every loaded module exactly once, in a stable order.
pub struct ModuleRegistry {
    catalog: ModuleCatalog,
    loaded: DashMap<String, Arc<dyn AsyncModule>>,
    load_order: RwLock<Vec<String>>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            loaded: DashMap::new(),
            load_order: RwLock::new(Vec::new()),
        }
    }

    /// Returns the module registered under `name`, instantiating it on first
    /// use. Unknown names yield `None`.
    pub fn load(&self, name: &str) -> Option<Arc<dyn AsyncModule>> {
        if let Some(module) = self.loaded.get(name) {
            return Some(Arc::clone(module.value()));
        }
        let Some(factory) = self.catalog.factory(name) else {
            warn!(module = name, "no transport module registered under this name");
            return None;
        };
        let module = match self.loaded.entry(name.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let module = factory();
                entry.insert(Arc::clone(&module));
                self.load_order.write().push(name.to_string());
                debug!(module = name, "transport module loaded");
                module
            }
        };
        Some(module)
    }

    /// Loaded modules, in load order.
    #[must_use]
    pub fn loaded_modules(&self) -> Vec<Arc<dyn AsyncModule>> {
        self.load_order
            .read()
            .iter()
            .filter_map(|name| self.loaded.get(name).map(|entry| Arc::clone(entry.value())))
            .collect()
    }

    /// Names of loaded modules, in load order.
    #[must_use]
    pub fn loaded_names(&self) -> Vec<String> {
        self.load_order.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("catalog", &self.catalog)
            .field("loaded", &self.loaded_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
