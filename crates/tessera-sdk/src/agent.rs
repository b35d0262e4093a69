//! The agent trait implemented by plugin-provided agents.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::PluginResult;
use crate::settings::SettingsSchema;
use crate::tool::Tool;

/// An agent created by a plugin.
///
/// The host resolves the agent's settings (see
/// [`SettingsSchema::resolve`]) and calls [`initialize`](Agent::initialize)
/// once before first use, then [`cleanup`](Agent::cleanup) when the agent
/// is retired.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Tools the agent exposes.
    fn tools(&self) -> Vec<Tool>;

    /// The agent's system prompt.
    fn system_prompt(&self) -> String;

    /// Apply resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are unusable.
    fn initialize(&mut self, config: &Map<String, Value>) -> PluginResult<()> {
        let _ = config;
        Ok(())
    }

    /// Release resources held by the agent.
    async fn cleanup(&mut self) {}

    /// Settings the agent accepts.
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::default()
    }
}

impl std::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tools().len())
            .finish_non_exhaustive()
    }
}
