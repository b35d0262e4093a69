//! Plugin registry.
//!
//! Keeps one canonical contract per plugin id plus every contract ever
//! registered, keyed by `(pid, version)`. When the same pid is registered
//! again, the higher semantic version becomes canonical unless the caller
//! forces an override.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::contract::PluginContract;
use crate::error::PluginResult;
use crate::module::ModuleExport;
use crate::plugin::Plugin;
use crate::version::parse_version;

static GLOBAL: OnceLock<Arc<PluginRegistry>> = OnceLock::new();

#[derive(Default)]
struct RegistryState {
    plugins: IndexMap<String, Arc<PluginContract>>,
    versions: IndexMap<(String, String), Arc<PluginContract>>,
}

/// Registry of plugin contracts keyed by plugin id.
///
/// Every operation takes the same lock, so concurrent registrations and
/// lookups never observe a half-applied update. Use [`PluginRegistry::global`]
/// for the process-wide instance or [`PluginRegistry::new`] for an isolated
/// one.
#[derive(Default)]
pub struct PluginRegistry {
    state: Mutex<RegistryState>,
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first access.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            debug!("Initializing global plugin registry");
            Arc::new(Self::new())
        }))
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a plugin and return the canonical contract for its pid.
    ///
    /// The returned contract is the pre-existing one when it wins the
    /// version comparison.
    ///
    /// # Errors
    ///
    /// Returns the plugin's metadata error, if any.
    pub fn register(
        &self,
        plugin: Arc<dyn Plugin>,
        override_existing: bool,
    ) -> PluginResult<Arc<PluginContract>> {
        let contract = PluginContract::new(plugin)?;
        Ok(self.register_contract(contract, override_existing))
    }

    /// Register a module export.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotAPlugin`](crate::PluginError::NotAPlugin)
    /// for non-plugin exports, or the plugin's metadata error.
    pub fn register_export(
        &self,
        export: &ModuleExport,
        override_existing: bool,
    ) -> PluginResult<Arc<PluginContract>> {
        let contract = PluginContract::from_export(export)?;
        Ok(self.register_contract(contract, override_existing))
    }

    /// Register an already-built contract and return the canonical one.
    pub fn register_contract(
        &self,
        contract: PluginContract,
        override_existing: bool,
    ) -> Arc<PluginContract> {
        let contract = Arc::new(contract);
        let pid = contract.pid().to_string();
        let version = contract.version().to_string();

        let mut state = self.lock();
        let canonical = match state.plugins.get(&pid) {
            Some(existing) if !override_existing => {
                if incoming_wins(existing, &contract) {
                    info!(plugin_id = %pid, from = %existing.version(), to = %version, "Replaced plugin version");
                    Arc::clone(&contract)
                } else {
                    debug!(
                        plugin_id = %pid,
                        kept = %existing.version(),
                        rejected = %version,
                        "Kept higher plugin version"
                    );
                    Arc::clone(existing)
                }
            },
            Some(existing) => {
                info!(plugin_id = %pid, from = %existing.version(), to = %version, "Overrode plugin registration");
                Arc::clone(&contract)
            },
            None => {
                info!(plugin_id = %pid, version = %version, "Registered plugin");
                Arc::clone(&contract)
            },
        };

        state.plugins.insert(pid.clone(), Arc::clone(&canonical));
        state.versions.insert((pid, version), contract);
        canonical
    }

    /// The canonical contract for `pid`.
    #[must_use]
    pub fn get_plugin(&self, pid: &str) -> Option<Arc<PluginContract>> {
        self.lock().plugins.get(pid).cloned()
    }

    /// The contract registered for exactly `pid` at `version`, canonical or not.
    #[must_use]
    pub fn get_plugin_by_version(&self, pid: &str, version: &str) -> Option<Arc<PluginContract>> {
        self.lock()
            .versions
            .get(&(pid.to_string(), version.to_string()))
            .cloned()
    }

    /// Every version ever registered for `pid`, in first-registration order.
    #[must_use]
    pub fn list_plugin_versions(&self, pid: &str) -> Vec<String> {
        self.lock()
            .versions
            .keys()
            .filter(|(p, _)| p == pid)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// All canonical contracts.
    #[must_use]
    pub fn list_registered_plugins(&self) -> Vec<Arc<PluginContract>> {
        self.lock().plugins.values().cloned().collect()
    }

    /// Canonical contracts advertising the capability `tag`.
    #[must_use]
    pub fn list_plugins_by_capability(&self, tag: &str) -> Vec<Arc<PluginContract>> {
        self.lock()
            .plugins
            .values()
            .filter(|c| c.metadata().has_capability(tag))
            .cloned()
            .collect()
    }

    /// Canonical contracts whose agent type is `agent_type`.
    #[must_use]
    pub fn list_plugins_by_type(&self, agent_type: &str) -> Vec<Arc<PluginContract>> {
        self.lock()
            .plugins
            .values()
            .filter(|c| c.agent_type() == agent_type)
            .cloned()
            .collect()
    }

    /// All registered plugin ids.
    #[must_use]
    pub fn get_all_ids(&self) -> Vec<String> {
        self.lock().plugins.keys().cloned().collect()
    }

    /// Whether `pid` has a canonical contract.
    #[must_use]
    pub fn has_plugin(&self, pid: &str) -> bool {
        self.lock().plugins.contains_key(pid)
    }

    /// Remove the canonical contract for `pid`.
    ///
    /// Version history is kept, so [`get_plugin_by_version`](Self::get_plugin_by_version)
    /// still finds it. Returns whether anything was removed.
    pub fn unregister(&self, pid: &str) -> bool {
        let removed = self.lock().plugins.shift_remove(pid).is_some();
        if removed {
            info!(plugin_id = %pid, "Unregistered plugin");
        }
        removed
    }

    /// Remove every contract, canonical and historical. Meant for tests.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.plugins.clear();
        state.versions.clear();
        debug!("Cleared plugin registry");
    }

    /// Number of canonical contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().plugins.len()
    }

    /// Whether no plugin is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .finish()
    }
}

/// Register `plugin` with the global registry.
///
/// # Errors
///
/// Returns the plugin's metadata error, if any.
pub fn register_plugin(
    plugin: Arc<dyn Plugin>,
    override_existing: bool,
) -> PluginResult<Arc<PluginContract>> {
    PluginRegistry::global().register(plugin, override_existing)
}

/// Whether `incoming` should replace `existing`.
///
/// Higher or equal versions win. If either version fails to parse the
/// incoming contract wins.
fn incoming_wins(existing: &PluginContract, incoming: &PluginContract) -> bool {
    match (parse_version(existing.version()), parse_version(incoming.version())) {
        (Some(old), Some(new)) => new.cmp(&old) != Ordering::Less,
        _ => {
            warn!(
                plugin_id = %incoming.pid(),
                existing = %existing.version(),
                incoming = %incoming.version(),
                "Unparseable plugin version, accepting incoming registration"
            );
            true
        },
    }
}
