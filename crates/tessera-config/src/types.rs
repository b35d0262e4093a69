use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Tessera configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plugin discovery settings.
    pub plugins: PluginsSection,
    /// Dependency installer settings.
    pub installer: InstallerSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// `[plugins]` section: where and how plugins are discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Root directories scanned for plugin packages.
    pub search_paths: Vec<PathBuf>,
    /// Extra directories searched when resolving plugin module imports.
    pub module_search_paths: Vec<PathBuf>,
    /// Whether discovered plugins are registered automatically.
    pub auto_register: bool,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            module_search_paths: Vec::new(),
            auto_register: true,
        }
    }
}

/// `[installer]` section: package-manager behavior for plugin dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct InstallerSection {
    /// Hard limit on a single package-manager run, in seconds.
    pub timeout_secs: u64,
    /// Install missing plugin dependencies automatically.
    pub auto_install: bool,
    /// Pass the upgrade flag to the package manager.
    pub upgrade: bool,
    /// Pass the quiet flag to the package manager.
    pub quiet: bool,
}

impl InstallerSection {
    /// The install timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for InstallerSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            auto_install: true,
            upgrade: false,
            quiet: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level filter (e.g. `"info"`).
    pub level: String,
    /// Output format: `pretty`, `compact` or `json`.
    pub format: String,
    /// Extra per-target directives (e.g. `tessera_sdk=debug`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
