//! The plugin trait.

use serde_json::{Map, Value, json};

use crate::agent::Agent;
use crate::error::PluginResult;
use crate::metadata::PluginMetadata;
use crate::settings::SettingsSchema;

/// The capability set every plugin provides.
///
/// Hosts never call a plugin directly; they wrap it in a
/// [`PluginContract`](crate::PluginContract), which computes the metadata
/// once and exposes a stable read-only view.
pub trait Plugin: Send + Sync {
    /// Describe the plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidMetadata`](crate::PluginError::InvalidMetadata)
    /// if the plugin's declared metadata is malformed.
    fn metadata(&self) -> PluginResult<PluginMetadata>;

    /// Create a fresh agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent cannot be constructed.
    fn create_agent(&self) -> PluginResult<Box<dyn Agent>>;

    /// Report unmet runtime dependencies as human-readable messages.
    fn validate_dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Report plugin health. The shape is up to the plugin.
    fn health_check(&self) -> Map<String, Value> {
        let mut status = Map::new();
        status.insert("status".to_string(), json!("unknown"));
        status
    }

    /// Settings the plugin's agents accept.
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::default()
    }
}
