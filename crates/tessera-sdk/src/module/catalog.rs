//! Host-provided agent factories referenced by plugin modules.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::agent::Agent;
use crate::error::PluginResult;

/// Builds a fresh agent.
pub type AgentFactory = Arc<dyn Fn() -> PluginResult<Box<dyn Agent>> + Send + Sync>;

static GLOBAL: OnceLock<Arc<AgentCatalog>> = OnceLock::new();

/// Named agent factories that declarative plugins bind to.
///
/// A `plugin.toml` export says `agent = "search"`; the loader looks up
/// `"search"` here. Registering a name twice replaces the earlier factory.
#[derive(Default)]
pub struct AgentCatalog {
    factories: RwLock<IndexMap<String, AgentFactory>>,
}

impl AgentCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide catalog used by default discovery.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Register a factory under `name`.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> PluginResult<Box<dyn Agent>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(agent = %name, "Registered agent factory");
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> PluginResult<Box<dyn Agent>> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Look up a factory.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<AgentFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Whether a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AgentCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCatalog")
            .field("agents", &self.names())
            .finish()
    }
}
