//! Plugin metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{PluginError, PluginResult};

/// Agent type assigned when a plugin does not declare one.
pub const DEFAULT_AGENT_TYPE: &str = "specialized";

/// SDK version requirement assigned when a plugin does not declare one.
pub const DEFAULT_SDK_VERSION: &str = ">=2.0.0, <3.0.0";

/// Immutable, validated description of a plugin.
///
/// Construction always validates: `pid`, `name`, `version` and `description`
/// must be non-empty and `version` must have two or three dot-separated
/// components. The components themselves are not required to be numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata")]
pub struct PluginMetadata {
    pid: String,
    name: String,
    version: String,
    description: String,
    capabilities: Vec<String>,
    dependencies: Vec<String>,
    agent_type: String,
    sdk_version: String,
    stateless: bool,
}

#[derive(Deserialize)]
struct RawMetadata {
    pid: String,
    name: String,
    version: String,
    description: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default = "default_agent_type")]
    agent_type: String,
    #[serde(default = "default_sdk_version")]
    sdk_version: String,
    #[serde(default = "default_stateless")]
    stateless: bool,
}

fn default_agent_type() -> String {
    DEFAULT_AGENT_TYPE.to_string()
}

fn default_sdk_version() -> String {
    DEFAULT_SDK_VERSION.to_string()
}

fn default_stateless() -> bool {
    true
}

impl TryFrom<RawMetadata> for PluginMetadata {
    type Error = PluginError;

    fn try_from(raw: RawMetadata) -> PluginResult<Self> {
        let metadata = Self {
            pid: raw.pid,
            name: raw.name,
            version: raw.version,
            description: raw.description,
            capabilities: raw.capabilities,
            dependencies: raw.dependencies,
            agent_type: raw.agent_type,
            sdk_version: raw.sdk_version,
            stateless: raw.stateless,
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

impl PluginMetadata {
    /// Create metadata with default optional fields.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidMetadata`] if a required field is empty
    /// or the version is malformed.
    pub fn new(
        pid: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> PluginResult<Self> {
        Self::builder(pid, name, version, description).build()
    }

    /// Start building metadata with optional fields.
    #[must_use]
    pub fn builder(
        pid: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> PluginMetadataBuilder {
        PluginMetadataBuilder {
            raw: RawMetadata {
                pid: pid.into(),
                name: name.into(),
                version: version.into(),
                description: description.into(),
                capabilities: Vec::new(),
                dependencies: Vec::new(),
                agent_type: default_agent_type(),
                sdk_version: default_sdk_version(),
                stateless: default_stateless(),
            },
        }
    }

    /// Reconstruct metadata from a JSON object, re-running validation.
    ///
    /// Missing optional fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidMetadata`] if the value is not an object
    /// with the required fields or fails validation.
    pub fn from_value(value: &Value) -> PluginResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| PluginError::InvalidMetadata(e.to_string()))
    }

    /// Serialize to a JSON object containing every field.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "pid": self.pid,
            "name": self.name,
            "version": self.version,
            "description": self.description,
            "capabilities": self.capabilities,
            "dependencies": self.dependencies,
            "agent_type": self.agent_type,
            "sdk_version": self.sdk_version,
            "stateless": self.stateless,
        })
    }

    fn validate(&self) -> PluginResult<()> {
        for (field, value) in [
            ("pid", &self.pid),
            ("name", &self.name),
            ("version", &self.version),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(PluginError::InvalidMetadata(format!(
                    "{field} must not be empty"
                )));
            }
        }

        let components = self.version.split('.').count();
        if !(2..=3).contains(&components) {
            return Err(PluginError::InvalidMetadata(format!(
                "version '{}' must have 2 or 3 dot-separated components",
                self.version
            )));
        }

        Ok(())
    }

    /// Globally unique reverse-domain identifier.
    #[must_use]
    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Capability tags, in declaration order.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Whether the plugin declares the given capability tag.
    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// Dependency specs (e.g. `requests>=2.0`), in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Agent type tag.
    #[must_use]
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    /// SDK version requirement.
    #[must_use]
    pub fn sdk_version(&self) -> &str {
        &self.sdk_version
    }

    /// Whether agents created by this plugin keep no per-conversation state.
    #[must_use]
    pub fn is_stateless(&self) -> bool {
        self.stateless
    }
}

/// Builder for [`PluginMetadata`] optional fields.
#[must_use]
pub struct PluginMetadataBuilder {
    raw: RawMetadata,
}

impl PluginMetadataBuilder {
    /// Add a capability tag.
    pub fn capability(mut self, tag: impl Into<String>) -> Self {
        self.raw.capabilities.push(tag.into());
        self
    }

    /// Replace the capability tags.
    pub fn capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw.capabilities = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the dependency specs.
    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the agent type tag.
    pub fn agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.raw.agent_type = agent_type.into();
        self
    }

    /// Set the SDK version requirement.
    pub fn sdk_version(mut self, requirement: impl Into<String>) -> Self {
        self.raw.sdk_version = requirement.into();
        self
    }

    /// Set whether the plugin's agents are stateless.
    pub fn stateless(mut self, stateless: bool) -> Self {
        self.raw.stateless = stateless;
        self
    }

    /// Validate and build the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidMetadata`] on validation failure.
    pub fn build(self) -> PluginResult<PluginMetadata> {
        PluginMetadata::try_from(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PluginMetadata {
        PluginMetadata::builder("com.example.search", "Search", "1.2.0", "Searches things")
            .capabilities(["search", "web"])
            .dependencies(["requests>=2.0"])
            .agent_type("retriever")
            .stateless(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let m = PluginMetadata::new("com.example.a", "A", "1.0", "desc").unwrap();
        assert_eq!(m.agent_type(), DEFAULT_AGENT_TYPE);
        assert_eq!(m.sdk_version(), DEFAULT_SDK_VERSION);
        assert!(m.is_stateless());
        assert!(m.capabilities().is_empty());
        assert!(m.dependencies().is_empty());
    }

    #[test]
    fn test_value_round_trip() {
        let m = sample();
        let restored = PluginMetadata::from_value(&m.to_value()).unwrap();
        assert_eq!(restored, m);
        assert_eq!(restored.capabilities(), ["search", "web"]);
        assert!(restored.has_capability("web"));
        assert!(!restored.has_capability("math"));
    }

    #[test]
    fn test_version_component_count() {
        for good in ["1.0", "1.0.0", "1.x", "a.b.c"] {
            assert!(
                PluginMetadata::new("com.example.a", "A", good, "desc").is_ok(),
                "{good} should be accepted"
            );
        }
        for bad in ["1", "1.0.0.0", "v1"] {
            let err = PluginMetadata::new("com.example.a", "A", bad, "desc").unwrap_err();
            assert!(matches!(err, PluginError::InvalidMetadata(_)), "{bad}");
        }
    }

    #[test]
    fn test_empty_required_fields_rejected() {
        assert!(PluginMetadata::new("", "A", "1.0", "desc").is_err());
        assert!(PluginMetadata::new("com.example.a", "", "1.0", "desc").is_err());
        assert!(PluginMetadata::new("com.example.a", "A", "", "desc").is_err());
        let err = PluginMetadata::new("com.example.a", "A", "1.0", "  ").unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_from_value_applies_defaults_and_validates() {
        let m = PluginMetadata::from_value(&json!({
            "pid": "com.example.b",
            "name": "B",
            "version": "2.0.0",
            "description": "desc",
        }))
        .unwrap();
        assert_eq!(m.agent_type(), DEFAULT_AGENT_TYPE);

        let bad = PluginMetadata::from_value(&json!({
            "pid": "com.example.b",
            "name": "B",
            "version": "2",
            "description": "desc",
        }));
        assert!(bad.is_err());

        assert!(PluginMetadata::from_value(&json!("not an object")).is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let m: PluginMetadata = toml::from_str(
            r#"
            pid = "com.example.c"
            name = "C"
            version = "0.3.1"
            description = "From TOML"
            capabilities = ["math"]
        "#,
        )
        .unwrap();
        assert_eq!(m.pid(), "com.example.c");
        assert_eq!(m.capabilities(), ["math"]);
    }
}
