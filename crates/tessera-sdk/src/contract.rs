//! The stable wrapper hosts use to talk to a plugin.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::agent::Agent;
use crate::error::PluginResult;
use crate::metadata::PluginMetadata;
use crate::module::{ExportItem, ModuleExport};
use crate::plugin::Plugin;
use crate::settings::SettingsSchema;

/// A plugin together with its metadata.
///
/// Metadata is computed exactly once, when the contract is built, rather
/// than on first access. A plugin with broken metadata therefore never
/// yields a contract, and the accessors below cannot fail. The plugin's
/// `metadata` is not called again for the life of the contract.
///
/// Contracts compare and hash by `(pid, version)`, so two contracts built
/// from the same plugin are interchangeable.
#[derive(Clone)]
pub struct PluginContract {
    plugin: Arc<dyn Plugin>,
    metadata: PluginMetadata,
}

impl PluginContract {
    /// Wrap a plugin, computing and caching its metadata.
    ///
    /// # Errors
    ///
    /// Returns the plugin's metadata error, if any.
    pub fn new(plugin: Arc<dyn Plugin>) -> PluginResult<Self> {
        let metadata = plugin.metadata()?;
        Ok(Self { plugin, metadata })
    }

    /// Wrap a module export.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotAPlugin`](crate::PluginError::NotAPlugin)
    /// if the export is not a plugin, or the plugin's metadata error.
    pub fn from_export(export: &ModuleExport) -> PluginResult<Self> {
        match &export.item {
            ExportItem::Plugin(plugin) => Self::new(Arc::clone(plugin)),
            other => Err(crate::PluginError::NotAPlugin {
                name: export.name.clone(),
                found: other.kind_name(),
            }),
        }
    }

    /// Plugin identifier.
    #[must_use]
    pub fn pid(&self) -> &str {
        self.metadata.pid()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Version string.
    #[must_use]
    pub fn version(&self) -> &str {
        self.metadata.version()
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.metadata.description()
    }

    /// Capability tags.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        self.metadata.capabilities()
    }

    /// Agent type tag.
    #[must_use]
    pub fn agent_type(&self) -> &str {
        self.metadata.agent_type()
    }

    /// Whether the plugin's agents are stateless.
    #[must_use]
    pub fn is_stateless(&self) -> bool {
        self.metadata.is_stateless()
    }

    /// The cached metadata.
    #[must_use]
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// The wrapped plugin.
    #[must_use]
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// The plugin's settings schema.
    #[must_use]
    pub fn settings_schema(&self) -> SettingsSchema {
        self.plugin.settings_schema()
    }

    /// Create a new agent. Every call produces a fresh agent.
    ///
    /// # Errors
    ///
    /// Propagates the plugin's factory error unchanged.
    pub fn create_agent(&self) -> PluginResult<Box<dyn Agent>> {
        debug!(pid = %self.pid(), "Creating agent");
        self.plugin.create_agent()
    }

    /// Unmet runtime dependencies reported by the plugin.
    #[must_use]
    pub fn validate_dependencies(&self) -> Vec<String> {
        self.plugin.validate_dependencies()
    }

    /// Health status reported by the plugin.
    #[must_use]
    pub fn health_check(&self) -> Map<String, Value> {
        self.plugin.health_check()
    }
}

impl PartialEq for PluginContract {
    fn eq(&self, other: &Self) -> bool {
        self.pid() == other.pid() && self.version() == other.version()
    }
}

impl Eq for PluginContract {}

impl Hash for PluginContract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pid().hash(state);
        self.version().hash(state);
    }
}

impl fmt::Debug for PluginContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContract")
            .field("pid", &self.pid())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PluginContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pid(), self.version())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::PluginError;
    use crate::tool::Tool;

    struct EchoAgent;

    impl Agent for EchoAgent {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool::sync("echo", "Echo", |args| Ok(Value::Object(args)))]
        }

        fn system_prompt(&self) -> String {
            "You echo.".into()
        }
    }

    struct CountingPlugin {
        metadata_calls: AtomicUsize,
        agents_created: AtomicUsize,
        version: &'static str,
    }

    impl CountingPlugin {
        fn new(version: &'static str) -> Self {
            Self {
                metadata_calls: AtomicUsize::new(0),
                agents_created: AtomicUsize::new(0),
                version,
            }
        }
    }

    impl Plugin for CountingPlugin {
        fn metadata(&self) -> PluginResult<PluginMetadata> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            PluginMetadata::builder("com.example.echo", "Echo", self.version, "Echoes")
                .capability("echo")
                .build()
        }

        fn create_agent(&self) -> PluginResult<Box<dyn Agent>> {
            self.agents_created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoAgent))
        }
    }

    struct BrokenPlugin;

    impl Plugin for BrokenPlugin {
        fn metadata(&self) -> PluginResult<PluginMetadata> {
            PluginMetadata::new("com.example.broken", "Broken", "1", "bad version")
        }

        fn create_agent(&self) -> PluginResult<Box<dyn Agent>> {
            Err(PluginError::AgentCreation {
                pid: "com.example.broken".into(),
                message: "unreachable".into(),
            })
        }
    }

    #[test]
    fn test_metadata_computed_once() {
        let plugin = Arc::new(CountingPlugin::new("1.0.0"));
        let contract = PluginContract::new(plugin.clone()).unwrap();

        assert_eq!(contract.pid(), "com.example.echo");
        assert_eq!(contract.name(), "Echo");
        assert_eq!(contract.version(), "1.0.0");
        assert_eq!(contract.capabilities(), ["echo"]);
        let _ = contract.metadata();
        let _ = contract.description();
        assert_eq!(plugin.metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_agent_returns_fresh_agents() {
        let plugin = Arc::new(CountingPlugin::new("1.0.0"));
        let contract = PluginContract::new(plugin.clone()).unwrap();
        let a = contract.create_agent().unwrap();
        let _b = contract.create_agent().unwrap();
        assert_eq!(plugin.agents_created.load(Ordering::SeqCst), 2);
        assert_eq!(a.system_prompt(), "You echo.");
        assert_eq!(a.tools()[0].name(), "echo");
    }

    #[test]
    fn test_default_delegations() {
        let contract = PluginContract::new(Arc::new(CountingPlugin::new("1.0.0"))).unwrap();
        assert!(contract.validate_dependencies().is_empty());
        assert_eq!(contract.health_check()["status"], json!("unknown"));
        assert!(contract.settings_schema().is_empty());
        assert!(contract.is_stateless());
        assert_eq!(contract.agent_type(), "specialized");
    }

    #[test]
    fn test_metadata_error_surfaces_at_construction() {
        let result = PluginContract::new(Arc::new(BrokenPlugin));
        assert!(matches!(result, Err(PluginError::InvalidMetadata(_))));
    }

    #[test]
    fn test_equality_and_hash_by_pid_and_version() {
        let a = PluginContract::new(Arc::new(CountingPlugin::new("1.0.0"))).unwrap();
        let b = PluginContract::new(Arc::new(CountingPlugin::new("1.0.0"))).unwrap();
        let c = PluginContract::new(Arc::new(CountingPlugin::new("2.0.0"))).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_export_rejects_non_plugins() {
        let export = ModuleExport {
            name: "Base".into(),
            item: ExportItem::AbstractBase,
        };
        let err = PluginContract::from_export(&export).unwrap_err();
        assert!(matches!(err, PluginError::NotAPlugin { ref name, .. } if name == "Base"));

        let value = ModuleExport {
            name: "VERSION".into(),
            item: ExportItem::Value(json!("1.0")),
        };
        assert!(PluginContract::from_export(&value).is_err());

        let plugin = ModuleExport {
            name: "Echo".into(),
            item: ExportItem::Plugin(Arc::new(CountingPlugin::new("1.0.0"))),
        };
        assert_eq!(PluginContract::from_export(&plugin).unwrap().version(), "1.0.0");
    }

    #[test]
    fn test_display() {
        let contract = PluginContract::new(Arc::new(CountingPlugin::new("1.0.0"))).unwrap();
        assert_eq!(contract.to_string(), "com.example.echo@1.0.0");
    }
}
