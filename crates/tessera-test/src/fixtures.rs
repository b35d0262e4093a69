//! On-disk plugin fixtures.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_sdk::{Agent, AgentCatalog, PLUGIN_MODULE_FILE, PluginMetadata};

use crate::mocks::MockAgent;

/// Agent factory name registered by [`mock_catalog`].
pub const MOCK_AGENT: &str = "mock";

/// A catalog with a single [`MockAgent`] factory under [`MOCK_AGENT`].
#[must_use]
pub fn mock_catalog() -> Arc<AgentCatalog> {
    Arc::new(AgentCatalog::new().with(MOCK_AGENT, || Ok(Box::new(MockAgent::default()) as Box<dyn Agent>)))
}

/// Valid metadata with every optional field set.
///
/// # Panics
///
/// Never; the values are valid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn sample_metadata() -> PluginMetadata {
    PluginMetadata::builder("com.example.sample", "Sample", "1.2.0", "A sample plugin")
        .capabilities(["search", "summarize"])
        .dependencies(["requests>=2.28"])
        .agent_type("specialized")
        .build()
        .unwrap()
}

/// `plugin.toml` text exporting one plugin bound to `agent`.
#[must_use]
pub fn plugin_module_source(pid: &str, name: &str, version: &str, agent: &str) -> String {
    let mut source = String::new();
    let _ = writeln!(source, "[[exports]]");
    let _ = writeln!(source, "name = \"{name}Plugin\"");
    let _ = writeln!(source, "agent = \"{agent}\"");
    let _ = writeln!(source);
    let _ = writeln!(source, "[exports.metadata]");
    let _ = writeln!(source, "pid = \"{pid}\"");
    let _ = writeln!(source, "name = \"{name}\"");
    let _ = writeln!(source, "version = \"{version}\"");
    let _ = writeln!(source, "description = \"Fixture plugin {pid}\"");
    source
}

/// Write `source` as the plugin module of `dir`, creating directories.
///
/// # Panics
///
/// Panics if the filesystem write fails.
#[allow(clippy::unwrap_used)]
pub fn write_module_source(dir: &Path, source: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(PLUGIN_MODULE_FILE);
    std::fs::write(&path, source).unwrap();
    path
}

/// Write a plugin module bound to the mock agent into `dir`.
///
/// # Panics
///
/// Panics if the filesystem write fails.
pub fn write_plugin_module(dir: &Path, pid: &str, name: &str, version: &str) -> PathBuf {
    write_module_source(dir, &plugin_module_source(pid, name, version, MOCK_AGENT))
}

/// Flat layout: `{root}/{dir_name}/plugin.toml`.
///
/// # Panics
///
/// Panics if the filesystem write fails.
pub fn write_flat_plugin(root: &Path, dir_name: &str, pid: &str, version: &str) -> PathBuf {
    write_plugin_module(&root.join(dir_name), pid, dir_name, version)
}

/// Versioned layout: `{root}/{pid}/{version}/plugin.toml`.
///
/// # Panics
///
/// Panics if the filesystem write fails.
pub fn write_versioned_plugin(root: &Path, pid: &str, version: &str) -> PathBuf {
    let name = pid.rsplit('.').next().unwrap_or(pid);
    write_plugin_module(&root.join(pid).join(version), pid, name, version)
}
