//! Declarative `plugin.toml` modules.
//!
//! ```toml
//! imports = ["shared.toml"]
//!
//! [[exports]]
//! name = "SearchPlugin"
//! kind = "plugin"
//! agent = "search"
//!
//! [exports.metadata]
//! pid = "com.example.search"
//! name = "Search"
//! version = "1.0.0"
//! description = "Searches things"
//!
//! [[exports.requires]]
//! env = "SEARCH_API_KEY"
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    AgentCatalog, AgentFactory, ExportItem, LoadedModule, ModuleExport, ModuleLoader,
    ModuleRequest, ModuleSearchPath,
};
use crate::agent::Agent;
use crate::error::{PluginError, PluginResult};
use crate::metadata::PluginMetadata;
use crate::plugin::Plugin;
use crate::settings::SettingsSchema;

/// File name of a plugin module inside a package directory.
pub const PLUGIN_MODULE_FILE: &str = "plugin.toml";

#[derive(Debug, Deserialize)]
struct ModuleFile {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    exports: Vec<ExportDecl>,
}

#[derive(Debug, Deserialize)]
struct ExportDecl {
    name: String,
    #[serde(default)]
    kind: ExportKind,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    metadata: Option<toml::Table>,
    #[serde(default)]
    requires: Vec<Requirement>,
    #[serde(default)]
    health: Option<toml::Table>,
    #[serde(default)]
    settings: Option<Vec<toml::Value>>,
    #[serde(default)]
    value: Option<toml::Value>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExportKind {
    #[default]
    Plugin,
    Abstract,
    Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Requirement {
    Env { env: String },
    Bin { bin: String },
}

impl Requirement {
    fn problem(&self) -> Option<String> {
        match self {
            Self::Env { env } => std::env::var_os(env)
                .is_none_or(|v| v.is_empty())
                .then(|| format!("Missing environment variable: {env}")),
            Self::Bin { bin } => which::which(bin)
                .is_err()
                .then(|| format!("Missing executable: {bin}")),
        }
    }
}

/// A plugin declared in a `plugin.toml` export.
///
/// Metadata is validated when [`Plugin::metadata`] is called, so a module
/// with bad metadata still loads and fails at contract construction.
pub struct DeclarativePlugin {
    export: String,
    agent: String,
    factory: AgentFactory,
    metadata: Value,
    requires: Vec<Requirement>,
    health: Option<Map<String, Value>>,
    settings: SettingsSchema,
}

impl DeclarativePlugin {
    /// Export name in the module.
    #[must_use]
    pub fn export_name(&self) -> &str {
        &self.export
    }

    /// Agent factory name this plugin is bound to.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent
    }
}

impl Plugin for DeclarativePlugin {
    fn metadata(&self) -> PluginResult<PluginMetadata> {
        PluginMetadata::from_value(&self.metadata)
    }

    fn create_agent(&self) -> PluginResult<Box<dyn Agent>> {
        (self.factory)()
    }

    fn validate_dependencies(&self) -> Vec<String> {
        self.requires.iter().filter_map(Requirement::problem).collect()
    }

    fn health_check(&self) -> Map<String, Value> {
        match &self.health {
            Some(health) => health.clone(),
            None => {
                let mut status = Map::new();
                status.insert("status".into(), Value::from("unknown"));
                status
            },
        }
    }

    fn settings_schema(&self) -> SettingsSchema {
        self.settings.clone()
    }
}

impl fmt::Debug for DeclarativePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclarativePlugin")
            .field("export", &self.export)
            .field("agent", &self.agent)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

/// Loads `plugin.toml` modules and binds plugin exports to agent factories.
#[derive(Debug, Clone)]
pub struct ManifestModuleLoader {
    catalog: Arc<AgentCatalog>,
    search_path: ModuleSearchPath,
}

impl Default for ManifestModuleLoader {
    fn default() -> Self {
        Self::new(AgentCatalog::global())
    }
}

impl ManifestModuleLoader {
    /// A loader resolving agents from `catalog`, with an empty search path.
    #[must_use]
    pub fn new(catalog: Arc<AgentCatalog>) -> Self {
        Self {
            catalog,
            search_path: ModuleSearchPath::new(),
        }
    }

    /// Use `search_path` for import resolution.
    #[must_use]
    pub fn with_search_path(mut self, search_path: ModuleSearchPath) -> Self {
        self.search_path = search_path;
        self
    }

    /// The search path imports resolve against.
    #[must_use]
    pub fn search_path(&self) -> &ModuleSearchPath {
        &self.search_path
    }

    /// The agent catalog exports bind to.
    #[must_use]
    pub fn catalog(&self) -> &Arc<AgentCatalog> {
        &self.catalog
    }

    fn load_file(
        &self,
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        exports: &mut Vec<ModuleExport>,
    ) -> PluginResult<()> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(key) {
            debug!(path = %path.display(), "Module already loaded, skipping import");
            return Ok(());
        }

        let module = read_module(path)?;
        for decl in module.exports {
            exports.push(self.bind_export(path, decl)?);
        }

        for import in &module.imports {
            let rel = import_path(path, import)?;
            let resolved =
                self.search_path
                    .resolve(&rel)
                    .ok_or_else(|| PluginError::ImportNotFound {
                        import: import.clone(),
                        path: path.to_path_buf(),
                    })?;
            debug!(import = %import, resolved = %resolved.display(), "Resolved module import");
            self.load_file(&resolved, visited, exports)?;
        }
        Ok(())
    }

    fn bind_export(&self, path: &Path, decl: ExportDecl) -> PluginResult<ModuleExport> {
        let item = match decl.kind {
            ExportKind::Abstract => ExportItem::AbstractBase,
            ExportKind::Value => ExportItem::Value(match &decl.value {
                Some(v) => to_json(path, v)?,
                None => Value::Null,
            }),
            ExportKind::Plugin => {
                let agent = decl.agent.clone().ok_or_else(|| PluginError::ModuleParse {
                    path: path.to_path_buf(),
                    message: format!("plugin export '{}' has no agent", decl.name),
                })?;
                let factory =
                    self.catalog
                        .get(&agent)
                        .ok_or_else(|| PluginError::AgentFactoryNotFound {
                            export: decl.name.clone(),
                            agent: agent.clone(),
                        })?;
                let metadata = match &decl.metadata {
                    Some(table) => to_json(path, table)?,
                    None => Value::Null,
                };
                let health = match &decl.health {
                    Some(table) => match to_json(path, table)? {
                        Value::Object(map) => Some(map),
                        _ => None,
                    },
                    None => None,
                };
                let settings = match &decl.settings {
                    Some(list) => SettingsSchema::from_value(&to_json(path, list)?)?,
                    None => SettingsSchema::default(),
                };
                ExportItem::Plugin(Arc::new(DeclarativePlugin {
                    export: decl.name.clone(),
                    agent,
                    factory,
                    metadata,
                    requires: decl.requires,
                    health,
                    settings,
                }))
            },
        };
        Ok(ModuleExport {
            name: decl.name,
            item,
        })
    }
}

impl ModuleLoader for ManifestModuleLoader {
    fn load(&self, request: &ModuleRequest) -> PluginResult<LoadedModule> {
        let _guard = self.search_path.push_front(&request.package_dir);
        let mut visited = HashSet::new();
        let mut exports = Vec::new();
        self.load_file(&request.module_file, &mut visited, &mut exports)?;
        debug!(
            module = %request.module_name,
            exports = exports.len(),
            "Loaded plugin module"
        );
        Ok(LoadedModule {
            name: request.module_name.clone(),
            path: request.module_file.clone(),
            exports,
        })
    }
}

fn read_module(path: &Path) -> PluginResult<ModuleFile> {
    let content = std::fs::read_to_string(path).map_err(|e| PluginError::ModuleLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| PluginError::ModuleParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Imports must be relative and stay below the search-path directory.
fn import_path(module: &Path, import: &str) -> PluginResult<PathBuf> {
    let rel = PathBuf::from(import);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if import.trim().is_empty() || escapes {
        return Err(PluginError::ModuleParse {
            path: module.to_path_buf(),
            message: format!("invalid import '{import}': must be a relative path without '..'"),
        });
    }
    Ok(rel)
}

fn to_json<T: serde::Serialize>(path: &Path, value: &T) -> PluginResult<Value> {
    serde_json::to_value(value).map_err(|e| PluginError::ModuleParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::tool::Tool;

    struct Finder;

    impl Agent for Finder {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool::sync("find", "Find things", |_| Ok(Value::Null))]
        }

        fn system_prompt(&self) -> String {
            "You find things.".into()
        }
    }

    fn loader() -> ManifestModuleLoader {
        let catalog = AgentCatalog::new().with("finder", || Ok(Box::new(Finder) as Box<dyn Agent>));
        ManifestModuleLoader::new(Arc::new(catalog))
    }

    fn request(dir: &Path) -> ModuleRequest {
        ModuleRequest {
            module_name: "_tessera_plugin_test".into(),
            module_file: dir.join(PLUGIN_MODULE_FILE),
            package_dir: dir.to_path_buf(),
        }
    }

    const SEARCH_MODULE: &str = r#"
[[exports]]
name = "Base"
kind = "abstract"

[[exports]]
name = "SearchPlugin"
agent = "finder"

[exports.metadata]
pid = "com.example.search"
name = "Search"
version = "1.2.0"
description = "Searches things"
capabilities = ["search"]

[exports.health]
status = "healthy"

[[exports.settings]]
key = "max_results"
type = "int"
default = 10
description = "Maximum results"
"#;

    #[test]
    fn test_load_binds_plugin_export() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PLUGIN_MODULE_FILE), SEARCH_MODULE).unwrap();

        let module = loader().load(&request(dir.path())).unwrap();
        assert_eq!(module.exports.len(), 2);
        assert_eq!(module.name, "_tessera_plugin_test");

        let export = module.find_plugin().unwrap();
        assert_eq!(export.name, "SearchPlugin");
        let ExportItem::Plugin(plugin) = &export.item else {
            panic!("expected plugin export");
        };
        let metadata = plugin.metadata().unwrap();
        assert_eq!(metadata.pid(), "com.example.search");
        assert_eq!(metadata.capabilities(), ["search"]);
        assert_eq!(plugin.health_check()["status"], "healthy");
        assert_eq!(plugin.settings_schema().len(), 1);
        assert_eq!(plugin.create_agent().unwrap().system_prompt(), "You find things.");
    }

    #[test]
    fn test_search_path_restored_after_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();

        fs::write(dir.path().join(PLUGIN_MODULE_FILE), SEARCH_MODULE).unwrap();
        loader.load(&request(dir.path())).unwrap();
        assert!(loader.search_path().snapshot().is_empty());

        fs::write(dir.path().join(PLUGIN_MODULE_FILE), "exports = [").unwrap();
        let err = loader.load(&request(dir.path())).unwrap_err();
        assert!(matches!(err, PluginError::ModuleParse { .. }));
        assert!(loader.search_path().snapshot().is_empty());
    }

    #[test]
    fn test_imports_resolve_from_package_dir_and_follow_own_exports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLUGIN_MODULE_FILE),
            r#"
imports = ["shared.toml"]

[[exports]]
name = "VERSION"
kind = "value"
value = "1.0"
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("shared.toml"),
            r#"
imports = ["plugin.toml"]

[[exports]]
name = "Shared"
agent = "finder"
metadata = { pid = "com.example.shared", name = "Shared", version = "1.0", description = "d" }
"#,
        )
        .unwrap();

        let module = loader().load(&request(dir.path())).unwrap();
        let names: Vec<_> = module.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["VERSION", "Shared"]);
        assert_eq!(module.find_plugin().unwrap().name, "Shared");
    }

    #[test]
    fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PLUGIN_MODULE_FILE), r#"imports = ["missing.toml"]"#).unwrap();
        let err = loader().load(&request(dir.path())).unwrap_err();
        assert!(matches!(err, PluginError::ImportNotFound { ref import, .. } if import == "missing.toml"));

        fs::write(dir.path().join(PLUGIN_MODULE_FILE), r#"imports = ["../escape.toml"]"#).unwrap();
        let err = loader().load(&request(dir.path())).unwrap_err();
        assert!(matches!(err, PluginError::ModuleParse { .. }));
    }

    #[test]
    fn test_unknown_agent_factory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLUGIN_MODULE_FILE),
            "[[exports]]\nname = \"Ghost\"\nagent = \"ghost\"\n",
        )
        .unwrap();
        let err = loader().load(&request(dir.path())).unwrap_err();
        assert!(matches!(err, PluginError::AgentFactoryNotFound { ref agent, .. } if agent == "ghost"));
    }

    #[test]
    fn test_missing_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader().load(&request(dir.path())).unwrap_err();
        assert!(matches!(err, PluginError::ModuleLoad { .. }));
    }

    #[test]
    fn test_bad_metadata_fails_lazily() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLUGIN_MODULE_FILE),
            "[[exports]]\nname = \"P\"\nagent = \"finder\"\n",
        )
        .unwrap();
        let module = loader().load(&request(dir.path())).unwrap();
        let ExportItem::Plugin(plugin) = &module.exports[0].item else {
            panic!("expected plugin export");
        };
        assert!(matches!(plugin.metadata(), Err(PluginError::InvalidMetadata(_))));
    }

    #[test]
    fn test_validate_dependencies_and_default_health() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PLUGIN_MODULE_FILE),
            r#"
[[exports]]
name = "P"
agent = "finder"
requires = [
    { env = "PATH" },
    { env = "TESSERA_TEST_SURELY_UNSET_VAR" },
    { bin = "tessera-no-such-binary-anywhere" },
]
"#,
        )
        .unwrap();
        let module = loader().load(&request(dir.path())).unwrap();
        let ExportItem::Plugin(plugin) = &module.exports[0].item else {
            panic!("expected plugin export");
        };
        assert_eq!(
            plugin.validate_dependencies(),
            vec![
                "Missing environment variable: TESSERA_TEST_SURELY_UNSET_VAR".to_string(),
                "Missing executable: tessera-no-such-binary-anywhere".to_string(),
            ]
        );
        assert_eq!(plugin.health_check()["status"], "unknown");
    }
}
