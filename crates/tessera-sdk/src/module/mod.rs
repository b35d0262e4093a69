//! Plugin module loading.
//!
//! A plugin module is a file that declares named exports. Loading one is
//! delegated to a [`ModuleLoader`]; the default [`ManifestModuleLoader`]
//! reads declarative `plugin.toml` files and binds each declared plugin to an
//! agent factory from an [`AgentCatalog`].
//!
//! While a module loads, its package directory sits at the front of the
//! loader's [`ModuleSearchPath`] so sibling imports resolve. The entry is
//! removed by a [`SearchPathGuard`] when loading finishes, however it ends.

mod catalog;
mod manifest;
mod search_path;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::error::PluginResult;
use crate::plugin::Plugin;

pub use catalog::{AgentCatalog, AgentFactory};
pub use manifest::{DeclarativePlugin, ManifestModuleLoader, PLUGIN_MODULE_FILE};
pub use search_path::{ModuleSearchPath, SearchPathGuard};

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Synthetic, collision-avoiding module name.
    pub module_name: String,
    /// Path to the plugin module file.
    pub module_file: PathBuf,
    /// Directory containing the module file.
    pub package_dir: PathBuf,
}

/// A declaration exported by a module.
#[derive(Clone)]
pub enum ExportItem {
    /// A plugin implementation.
    Plugin(Arc<dyn Plugin>),
    /// The abstract plugin base itself, re-exported for reference.
    AbstractBase,
    /// Any other value.
    Value(Value),
}

impl ExportItem {
    /// Short description of the export kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Plugin(_) => "plugin",
            Self::AbstractBase => "abstract plugin base",
            Self::Value(_) => "value",
        }
    }
}

impl fmt::Debug for ExportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(_) => f.write_str("Plugin(..)"),
            Self::AbstractBase => f.write_str("AbstractBase"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// A named export.
#[derive(Debug, Clone)]
pub struct ModuleExport {
    /// Export name.
    pub name: String,
    /// Exported item.
    pub item: ExportItem,
}

/// A loaded module: its exports in declaration order.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// Synthetic module name from the request.
    pub name: String,
    /// Module file the exports came from.
    pub path: PathBuf,
    /// Exports in declaration order; imported exports follow the module's own.
    pub exports: Vec<ModuleExport>,
}

impl LoadedModule {
    /// The first export that is a plugin implementation.
    ///
    /// The abstract base and plain values are skipped. Later plugin exports
    /// are ignored.
    #[must_use]
    pub fn find_plugin(&self) -> Option<&ModuleExport> {
        self.exports
            .iter()
            .find(|e| matches!(e.item, ExportItem::Plugin(_)))
    }
}

/// Loads plugin modules from files.
pub trait ModuleLoader: Send + Sync {
    /// Load the module described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot be read, parsed or bound.
    fn load(&self, request: &ModuleRequest) -> PluginResult<LoadedModule>;
}

/// Synthetic module name for a package directory name.
///
/// Every character that is not ASCII alphanumeric or `_` becomes `_`.
#[must_use]
pub fn synthetic_module_name(dir_name: &str) -> String {
    let sanitized: String = dir_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("_tessera_plugin_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_module_name() {
        assert_eq!(synthetic_module_name("my-plugin"), "_tessera_plugin_my_plugin");
        assert_eq!(synthetic_module_name("1.0.0"), "_tessera_plugin_1_0_0");
        assert_eq!(
            synthetic_module_name("com.example.search"),
            "_tessera_plugin_com_example_search"
        );
        assert_eq!(synthetic_module_name("plain_name"), "_tessera_plugin_plain_name");
    }

    #[test]
    fn test_find_plugin_skips_non_plugins() {
        let module = LoadedModule {
            name: "_tessera_plugin_x".into(),
            path: PathBuf::from("plugin.toml"),
            exports: vec![
                ModuleExport {
                    name: "Base".into(),
                    item: ExportItem::AbstractBase,
                },
                ModuleExport {
                    name: "VERSION".into(),
                    item: ExportItem::Value(Value::from("1")),
                },
            ],
        };
        assert!(module.find_plugin().is_none());
        assert_eq!(module.exports[0].item.kind_name(), "abstract plugin base");
    }
}
