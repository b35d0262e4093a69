//! Mock plugins and agents.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tessera_sdk::{
    Agent, Plugin, PluginError, PluginMetadata, PluginResult, SettingsSchema, Tool,
};

/// An agent whose tools echo their arguments.
///
/// Records the settings it was initialized with and whether it was cleaned
/// up; clones share that record.
#[derive(Debug, Clone)]
pub struct MockAgent {
    prompt: String,
    tools: Vec<String>,
    initialized_with: Arc<Mutex<Option<Map<String, Value>>>>,
    cleaned_up: Arc<AtomicBool>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new("You are a mock agent.")
    }
}

impl MockAgent {
    /// A mock agent with the given system prompt and one `echo` tool.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tools: vec!["echo".to_string()],
            initialized_with: Arc::new(Mutex::new(None)),
            cleaned_up: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the tool list.
    #[must_use]
    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = names.into_iter().map(Into::into).collect();
        self
    }

    /// Settings passed to the last `initialize` call.
    #[must_use]
    pub fn initialized_with(&self) -> Option<Map<String, Value>> {
        self.initialized_with.lock().ok().and_then(|g| g.clone())
    }

    /// Whether `cleanup` has run.
    #[must_use]
    pub fn was_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|name| Tool::sync(name.clone(), format!("Mock tool {name}"), |args| Ok(Value::Object(args))))
            .collect()
    }

    fn system_prompt(&self) -> String {
        self.prompt.clone()
    }

    fn initialize(&mut self, config: &Map<String, Value>) -> PluginResult<()> {
        if let Ok(mut guard) = self.initialized_with.lock() {
            *guard = Some(config.clone());
        }
        Ok(())
    }

    async fn cleanup(&mut self) {
        self.cleaned_up.store(true, Ordering::SeqCst);
    }
}

/// A configurable in-memory plugin.
#[derive(Debug, Clone)]
pub struct MockPlugin {
    pid: String,
    name: String,
    version: String,
    capabilities: Vec<String>,
    agent_type: Option<String>,
    missing_dependencies: Vec<String>,
    settings: SettingsSchema,
    fail_agent: bool,
    agents_created: Arc<AtomicUsize>,
}

impl MockPlugin {
    /// A plugin with the given id and version, named after the id.
    #[must_use]
    pub fn new(pid: impl Into<String>, version: impl Into<String>) -> Self {
        let pid = pid.into();
        Self {
            name: pid.rsplit('.').next().unwrap_or(&pid).to_string(),
            pid,
            version: version.into(),
            capabilities: Vec::new(),
            agent_type: None,
            missing_dependencies: Vec::new(),
            settings: SettingsSchema::default(),
            fail_agent: false,
            agents_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a capability tag.
    #[must_use]
    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.push(tag.into());
        self
    }

    /// Set the agent type tag.
    #[must_use]
    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }

    /// Report `problem` from `validate_dependencies`.
    #[must_use]
    pub fn with_missing_dependency(mut self, problem: impl Into<String>) -> Self {
        self.missing_dependencies.push(problem.into());
        self
    }

    /// Declare a settings schema.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsSchema) -> Self {
        self.settings = settings;
        self
    }

    /// Make `create_agent` fail.
    #[must_use]
    pub fn failing_agent(mut self) -> Self {
        self.fail_agent = true;
        self
    }

    /// Number of agents created so far, shared across clones.
    #[must_use]
    pub fn agents_created(&self) -> usize {
        self.agents_created.load(Ordering::SeqCst)
    }
}

impl Plugin for MockPlugin {
    fn metadata(&self) -> PluginResult<PluginMetadata> {
        let mut builder = PluginMetadata::builder(
            self.pid.clone(),
            self.name.clone(),
            self.version.clone(),
            format!("Mock plugin {}", self.pid),
        )
        .capabilities(self.capabilities.clone());
        if let Some(agent_type) = &self.agent_type {
            builder = builder.agent_type(agent_type.clone());
        }
        builder.build()
    }

    fn create_agent(&self) -> PluginResult<Box<dyn Agent>> {
        if self.fail_agent {
            return Err(PluginError::AgentCreation {
                pid: self.pid.clone(),
                message: "mock agent failure".to_string(),
            });
        }
        self.agents_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAgent::default()))
    }

    fn validate_dependencies(&self) -> Vec<String> {
        self.missing_dependencies.clone()
    }

    fn settings_schema(&self) -> SettingsSchema {
        self.settings.clone()
    }
}
