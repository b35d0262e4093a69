//! Directory plugin discovery.
//!
//! Two layouts are recognized under each root:
//!
//! ```text
//! {root}/{plugin_name}/plugin.toml                    flat
//! {root}/{pid}/{version}/plugin.toml                  versioned
//! {root}/{pid}/{version}/{subpackage}/plugin.toml     versioned, nested
//! ```
//!
//! A top-level directory with a `plugin.toml` is flat; otherwise its
//! subdirectories are treated as versions. Entries are visited in sorted
//! order. A plugin that fails to load is logged and skipped; discovery itself
//! never fails.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tessera_config::PluginsSection;
use tracing::{debug, error, info, warn};

use crate::contract::PluginContract;
use crate::error::{PluginError, PluginResult};
use crate::module::{
    AgentCatalog, ManifestModuleLoader, ModuleLoader, ModuleRequest, ModuleSearchPath,
    PLUGIN_MODULE_FILE, synthetic_module_name,
};
use crate::registry::PluginRegistry;

/// Directory names never scanned, in addition to hidden ones.
const SKIPPED_DIRS: &[&str] = &["__pycache__", "target", "node_modules"];

/// Scans filesystem roots for plugin modules.
pub struct DirectoryPluginDiscovery {
    search_paths: Vec<PathBuf>,
    auto_register: bool,
    loader: Arc<dyn ModuleLoader>,
    registry: Option<Arc<PluginRegistry>>,
    discovered: IndexMap<String, Arc<PluginContract>>,
}

impl DirectoryPluginDiscovery {
    /// A scanner over `search_paths` using the default manifest loader and
    /// the global registry.
    #[must_use]
    pub fn new<I, P>(search_paths: I, auto_register: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            auto_register,
            loader: Arc::new(ManifestModuleLoader::default()),
            registry: None,
            discovered: IndexMap::new(),
        }
    }

    /// A scanner configured from the `[plugins]` config section.
    #[must_use]
    pub fn from_config(config: &PluginsSection) -> Self {
        let loader = ManifestModuleLoader::new(AgentCatalog::global())
            .with_search_path(ModuleSearchPath::from_dirs(&config.module_search_paths));
        Self::new(&config.search_paths, config.auto_register).with_loader(Arc::new(loader))
    }

    /// Load modules with `loader`.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Bind plugin exports to factories from `catalog`.
    #[must_use]
    pub fn with_catalog(self, catalog: Arc<AgentCatalog>) -> Self {
        self.with_loader(Arc::new(ManifestModuleLoader::new(catalog)))
    }

    /// Register into `registry` instead of the global one.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Roots this scanner walks.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Whether discovered plugins are registered.
    #[must_use]
    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    /// Scan every root and return one contract per loaded plugin.
    ///
    /// With auto-registration each contract is whatever the registry
    /// resolved the registration to, so a losing version shows up as the
    /// canonical contract that beat it.
    pub fn discover(&mut self) -> Vec<Arc<PluginContract>> {
        let mut found = Vec::new();
        for root in &self.search_paths {
            if !root.is_dir() {
                debug!(path = %root.display(), "Skipping missing plugin search path");
                continue;
            }
            info!(path = %root.display(), "Discovering plugins");
            found.extend(self.scan_root(root));
        }

        self.discovered = found
            .iter()
            .map(|c| (c.name().to_string(), Arc::clone(c)))
            .collect();
        info!(count = found.len(), "Discovered plugins");
        found
    }

    /// Forget the previous scan and scan again.
    pub fn reset(&mut self) -> Vec<Arc<PluginContract>> {
        self.discovered.clear();
        self.discover()
    }

    /// Contracts from the most recent scan, keyed by plugin name.
    #[must_use]
    pub fn get_discovered(&self) -> IndexMap<String, Arc<PluginContract>> {
        self.discovered.clone()
    }

    fn scan_root(&self, root: &Path) -> Vec<Arc<PluginContract>> {
        let mut found = Vec::new();
        for item in scannable_dirs(root) {
            let module_file = item.join(PLUGIN_MODULE_FILE);
            if module_file.is_file() {
                found.extend(self.load_contract(&item, module_file));
            } else {
                found.extend(self.scan_pid_dir(&item));
            }
        }
        found
    }

    fn scan_pid_dir(&self, pid_dir: &Path) -> Vec<Arc<PluginContract>> {
        let mut found = Vec::new();
        for version_dir in scannable_dirs(pid_dir) {
            let module_file = version_dir.join(PLUGIN_MODULE_FILE);
            if module_file.is_file() {
                found.extend(self.load_contract(&version_dir, module_file));
                continue;
            }

            let nested = scannable_dirs(&version_dir)
                .into_iter()
                .find(|sub| sub.join(PLUGIN_MODULE_FILE).is_file());
            match nested {
                Some(sub) => {
                    let module_file = sub.join(PLUGIN_MODULE_FILE);
                    found.extend(self.load_contract(&sub, module_file));
                },
                None => {
                    debug!(path = %version_dir.display(), "No plugin module in version directory");
                },
            }
        }
        found
    }

    fn load_contract(&self, package_dir: &Path, module_file: PathBuf) -> Option<Arc<PluginContract>> {
        match self.try_load(package_dir, module_file) {
            Ok(contract) => {
                debug!(
                    plugin_id = %contract.pid(),
                    version = %contract.version(),
                    path = %package_dir.display(),
                    "Loaded plugin"
                );
                Some(contract)
            },
            Err(e) => {
                error!(path = %package_dir.display(), error = %e, "Failed to load plugin");
                None
            },
        }
    }

    fn try_load(&self, package_dir: &Path, module_file: PathBuf) -> PluginResult<Arc<PluginContract>> {
        let dir_name = package_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let request = ModuleRequest {
            module_name: synthetic_module_name(&dir_name),
            module_file,
            package_dir: package_dir.to_path_buf(),
        };

        let module = self.loader.load(&request)?;
        let export = module
            .find_plugin()
            .ok_or_else(|| PluginError::NoPluginExport(module.path.clone()))?;

        if self.auto_register {
            let registry = self.registry.clone().unwrap_or_else(PluginRegistry::global);
            registry.register_export(export, false)
        } else {
            PluginContract::from_export(export).map(Arc::new)
        }
    }
}

impl fmt::Debug for DirectoryPluginDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryPluginDiscovery")
            .field("paths", &self.search_paths.len())
            .field("discovered", &self.discovered.len())
            .finish_non_exhaustive()
    }
}

/// Scan `search_paths` with default settings.
pub fn discover_plugins<I, P>(search_paths: I, auto_register: bool) -> Vec<Arc<PluginContract>>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    DirectoryPluginDiscovery::new(search_paths, auto_register).discover()
}

fn should_scan(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| !name.starts_with('.') && !SKIPPED_DIRS.contains(&name))
}

/// Subdirectories of `dir` worth scanning, sorted by path.
fn scannable_dirs(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to read plugin directory");
            return Vec::new();
        },
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| should_scan(path))
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;

    use super::*;
    use crate::agent::Agent;
    use crate::tool::Tool;

    struct Helper;

    impl Agent for Helper {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool::sync("help", "Help out", |_| Ok(Value::Null))]
        }

        fn system_prompt(&self) -> String {
            "You help.".into()
        }
    }

    fn catalog() -> Arc<AgentCatalog> {
        Arc::new(AgentCatalog::new().with("helper", || Ok(Box::new(Helper) as Box<dyn Agent>)))
    }

    fn write_module(dir: &Path, pid: &str, name: &str, version: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(PLUGIN_MODULE_FILE),
            format!(
                "[[exports]]\nname = \"P\"\nagent = \"helper\"\n\n[exports.metadata]\n\
                 pid = \"{pid}\"\nname = \"{name}\"\nversion = \"{version}\"\ndescription = \"test\"\n"
            ),
        )
        .unwrap();
    }

    fn scanner(root: &Path, registry: &Arc<PluginRegistry>) -> DirectoryPluginDiscovery {
        DirectoryPluginDiscovery::new([root], true)
            .with_catalog(catalog())
            .with_registry(Arc::clone(registry))
    }

    #[test]
    fn test_flat_layout() {
        let root = tempfile::tempdir().unwrap();
        write_module(&root.path().join("search"), "com.example.search", "Search", "1.0.0");

        let registry = Arc::new(PluginRegistry::new());
        let mut discovery = scanner(root.path(), &registry);
        let found = discovery.discover();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid(), "com.example.search");
        assert!(registry.has_plugin("com.example.search"));
        assert!(discovery.get_discovered().contains_key("Search"));
    }

    #[test]
    fn test_versioned_layout_keeps_highest() {
        let root = tempfile::tempdir().unwrap();
        let pid_dir = root.path().join("com.example.search");
        write_module(&pid_dir.join("1.0.0"), "com.example.search", "Search", "1.0.0");
        write_module(&pid_dir.join("2.0.0"), "com.example.search", "Search", "2.0.0");

        let registry = Arc::new(PluginRegistry::new());
        let found = scanner(root.path(), &registry).discover();

        assert_eq!(found.len(), 2);
        assert_eq!(registry.get_plugin("com.example.search").unwrap().version(), "2.0.0");
        assert_eq!(
            registry.list_plugin_versions("com.example.search"),
            vec!["1.0.0", "2.0.0"]
        );
    }

    #[test]
    fn test_nested_subpackage_first_match() {
        let root = tempfile::tempdir().unwrap();
        let version_dir = root.path().join("com.example.nested").join("1.0.0");
        write_module(&version_dir.join("b_pkg"), "com.example.nested", "B", "1.0.0");
        write_module(&version_dir.join("a_pkg"), "com.example.nested", "A", "1.0.0");

        let registry = Arc::new(PluginRegistry::new());
        let found = scanner(root.path(), &registry).discover();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "A");
    }

    #[test]
    fn test_skips_hidden_cache_and_files() {
        let root = tempfile::tempdir().unwrap();
        write_module(&root.path().join(".hidden"), "com.example.hidden", "Hidden", "1.0.0");
        write_module(&root.path().join("__pycache__"), "com.example.cache", "Cache", "1.0.0");
        write_module(&root.path().join("node_modules"), "com.example.nm", "Nm", "1.0.0");
        fs::write(root.path().join("README.md"), "not a plugin").unwrap();
        fs::create_dir_all(root.path().join("empty")).unwrap();

        let registry = Arc::new(PluginRegistry::new());
        assert!(scanner(root.path(), &registry).discover().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failures_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_module(&root.path().join("good"), "com.example.good", "Good", "1.0.0");
        write_module(&root.path().join("bad_version"), "com.example.bad", "Bad", "1");
        let broken = root.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(PLUGIN_MODULE_FILE), "[[exports]\n").unwrap();
        let no_plugin = root.path().join("no_plugin");
        fs::create_dir_all(&no_plugin).unwrap();
        fs::write(
            no_plugin.join(PLUGIN_MODULE_FILE),
            "[[exports]]\nname = \"Base\"\nkind = \"abstract\"\n",
        )
        .unwrap();

        let registry = Arc::new(PluginRegistry::new());
        let found = scanner(root.path(), &registry).discover();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid(), "com.example.good");
    }

    #[test]
    fn test_missing_roots_and_no_auto_register() {
        let root = tempfile::tempdir().unwrap();
        write_module(&root.path().join("p"), "com.example.p", "P", "1.0");
        let file_root = root.path().join("file.txt");
        fs::write(&file_root, "").unwrap();

        let registry = Arc::new(PluginRegistry::new());
        let mut discovery = DirectoryPluginDiscovery::new(
            [root.path().join("missing"), file_root, root.path().to_path_buf()],
            false,
        )
        .with_catalog(catalog())
        .with_registry(Arc::clone(&registry));

        let found = discovery.discover();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), "1.0");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reset_rescans() {
        let root = tempfile::tempdir().unwrap();
        write_module(&root.path().join("one"), "com.example.one", "One", "1.0.0");

        let registry = Arc::new(PluginRegistry::new());
        let mut discovery = scanner(root.path(), &registry);
        assert_eq!(discovery.discover().len(), 1);

        write_module(&root.path().join("two"), "com.example.two", "Two", "1.0.0");
        let found = discovery.reset();
        assert_eq!(found.len(), 2);
        assert_eq!(discovery.get_discovered().len(), 2);
        assert_eq!(format!("{discovery:?}"), "DirectoryPluginDiscovery { paths: 1, discovered: 2, .. }");
    }

    #[test]
    fn test_from_config() {
        let config = PluginsSection {
            search_paths: vec![PathBuf::from("/opt/plugins")],
            module_search_paths: vec![PathBuf::from("/opt/shared")],
            auto_register: false,
        };
        let discovery = DirectoryPluginDiscovery::from_config(&config);
        assert_eq!(discovery.search_paths(), [PathBuf::from("/opt/plugins")]);
        assert!(!discovery.auto_register());
    }
}
