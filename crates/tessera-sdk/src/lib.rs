#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Tessera plugin SDK.
//!
//! Defines what a plugin is ([`Plugin`], [`PluginMetadata`], [`Agent`],
//! [`Tool`]), wraps plugins in a stable [`PluginContract`], keeps them in a
//! versioned [`PluginRegistry`], and finds them on disk with
//! [`DirectoryPluginDiscovery`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tessera_sdk::{AgentCatalog, DirectoryPluginDiscovery, PluginRegistry};
//!
//! let registry = Arc::new(PluginRegistry::new());
//! let catalog = Arc::new(AgentCatalog::new());
//!
//! let mut discovery = DirectoryPluginDiscovery::new(["/opt/tessera/plugins"], true)
//!     .with_catalog(catalog)
//!     .with_registry(Arc::clone(&registry));
//!
//! for contract in discovery.discover() {
//!     println!("{contract}: {}", contract.description());
//! }
//! ```
//!
//! # On-disk layouts
//!
//! Discovery accepts `{root}/{name}/plugin.toml` and
//! `{root}/{pid}/{version}/plugin.toml`; see [`discovery`] for details.

/// The agent trait.
pub mod agent;
/// Plugin contracts.
pub mod contract;
/// Directory plugin discovery.
pub mod discovery;
/// Error types.
pub mod error;
/// Dependency installation.
pub mod installer;
/// Plugin metadata.
pub mod metadata;
/// Plugin module loading.
pub mod module;
/// The plugin trait.
pub mod plugin;
/// The plugin registry.
pub mod registry;
/// Settings schemas.
pub mod settings;
/// Agent tools.
pub mod tool;
/// Structural validation.
pub mod validation;
mod version;

pub use agent::Agent;
pub use contract::PluginContract;
pub use discovery::{DirectoryPluginDiscovery, discover_plugins};
pub use error::{InstallError, InstallResult, PluginError, PluginResult, ToolError, ToolResult};
pub use installer::{DEFAULT_INSTALL_TIMEOUT, PackageManager, extract_package_name};
pub use metadata::{PluginMetadata, PluginMetadataBuilder};
pub use module::{
    AgentCatalog, AgentFactory, DeclarativePlugin, ExportItem, LoadedModule, ManifestModuleLoader,
    ModuleExport, ModuleLoader, ModuleRequest, ModuleSearchPath, PLUGIN_MODULE_FILE,
    SearchPathGuard,
};
pub use plugin::Plugin;
pub use registry::{PluginRegistry, register_plugin};
pub use settings::{SettingDefinition, SettingType, SettingsSchema};
pub use tool::{CacheConfig, CacheSetting, Tool, ToolArgs, ToolBuilder, ToolHandler};
pub use validation::{
    ValidationReport, validate_plugin_structure, validate_plugin_structure_shallow,
    validate_sdk_version_compatibility,
};

pub use tessera_types as types;
