//! Settings schemas declared by plugins and agents.
//!
//! A schema is an ordered list of [`SettingDefinition`]s. The host resolves
//! user-provided overrides against the schema and hands the flat result to
//! [`Agent::initialize`](crate::Agent::initialize).

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PluginError, PluginResult};

/// Placeholder written in place of sensitive values by [`SettingsSchema::redact`].
pub const REDACTED: &str = "***";

/// Value type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// String.
    Str,
    /// Integer.
    Int,
    /// Floating-point number. Integers are accepted.
    Float,
    /// Boolean.
    Bool,
    /// List.
    List,
    /// Key-value map.
    Dict,
}

impl SettingType {
    /// Parse a type name (`str`, `int`, `float`, `bool`, `list`, `dict`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "list" => Some(Self::List),
            "dict" => Some(Self::Dict),
            _ => None,
        }
    }

    /// Whether `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Dict => value.is_object(),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Dict => "dict",
        };
        f.write_str(s)
    }
}

/// One configurable setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingDefinition {
    /// Unique key used in the resolved settings map.
    pub key: String,
    /// Display label. Defaults to the key.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    /// Default value, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable description.
    pub description: String,
    /// Whether a value must be supplied when there is no default.
    pub required: bool,
    /// Whether the value must be masked in logs and UIs.
    pub sensitive: bool,
}

impl SettingDefinition {
    /// Create an optional, non-sensitive setting with no default.
    #[must_use]
    pub fn new(key: impl Into<String>, setting_type: SettingType, description: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            setting_type,
            default: None,
            description: description.into(),
            required: false,
            sensitive: false,
        }
    }

    /// Set the display label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark the setting as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the setting as sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn check_default(&self) -> PluginResult<()> {
        match &self.default {
            Some(v) if !v.is_null() && !self.setting_type.matches(v) => {
                Err(PluginError::InvalidSettings(format!(
                    "default for '{}' does not match declared type {}",
                    self.key, self.setting_type
                )))
            },
            _ => Ok(()),
        }
    }
}

/// An ordered, key-unique list of settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SettingsSchema {
    settings: Vec<SettingDefinition>,
}

impl SettingsSchema {
    /// Build a schema from typed definitions.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] on duplicate keys, empty keys
    /// or defaults whose type does not match the declared type.
    pub fn new(settings: Vec<SettingDefinition>) -> PluginResult<Self> {
        let mut seen = HashSet::new();
        for def in &settings {
            if def.key.is_empty() {
                return Err(PluginError::InvalidSettings("setting key must not be empty".into()));
            }
            if !seen.insert(def.key.as_str()) {
                return Err(PluginError::InvalidSettings(format!(
                    "duplicate setting key '{}'",
                    def.key
                )));
            }
            def.check_default()?;
        }
        Ok(Self { settings })
    }

    /// Parse an untyped schema: a list of objects with `key`, `type` and
    /// `description`, plus optional `name`, `default`, `required` and
    /// `sensitive`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSettings`] describing the first problem.
    pub fn from_value(value: &Value) -> PluginResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| PluginError::InvalidSettings("settings schema must be a list".into()))?;

        let settings = items
            .iter()
            .enumerate()
            .map(|(idx, item)| parse_definition(idx, item))
            .collect::<PluginResult<Vec<_>>>()?;

        Self::new(settings)
    }

    /// Append the settings of `other` whose keys are not already declared.
    #[must_use]
    pub fn merge(mut self, other: &Self) -> Self {
        for def in &other.settings {
            if self.get(&def.key).is_some() {
                debug!(key = %def.key, "Skipping duplicate setting during merge");
                continue;
            }
            self.settings.push(def.clone());
        }
        self
    }

    /// Resolve the flat settings map passed to an agent.
    ///
    /// Overrides win over defaults. Keys in `overrides` that the schema does
    /// not declare are passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::MissingSetting`] for a required setting with no
    /// override and no default, and [`PluginError::InvalidSettings`] for an
    /// override of the wrong type.
    pub fn resolve(&self, overrides: &Map<String, Value>) -> PluginResult<Map<String, Value>> {
        let mut resolved = Map::new();

        for def in &self.settings {
            match (overrides.get(&def.key), &def.default) {
                (Some(v), _) => {
                    if !v.is_null() && !def.setting_type.matches(v) {
                        return Err(PluginError::InvalidSettings(format!(
                            "value for '{}' must be of type {}",
                            def.key, def.setting_type
                        )));
                    }
                    resolved.insert(def.key.clone(), v.clone());
                },
                (None, Some(default)) => {
                    resolved.insert(def.key.clone(), default.clone());
                },
                (None, None) if def.required => {
                    return Err(PluginError::MissingSetting(def.key.clone()));
                },
                (None, None) => {},
            }
        }

        for (key, value) in overrides {
            if !resolved.contains_key(key) {
                resolved.insert(key.clone(), value.clone());
            }
        }

        Ok(resolved)
    }

    /// Copy `values` with every sensitive setting replaced by [`REDACTED`].
    #[must_use]
    pub fn redact(&self, values: &Map<String, Value>) -> Map<String, Value> {
        let mut out = values.clone();
        for def in self.settings.iter().filter(|d| d.sensitive) {
            if let Some(v) = out.get_mut(&def.key) {
                *v = Value::String(REDACTED.to_string());
            }
        }
        out
    }

    /// Look up a setting by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SettingDefinition> {
        self.settings.iter().find(|d| d.key == key)
    }

    /// All settings, in declaration order.
    #[must_use]
    pub fn definitions(&self) -> &[SettingDefinition] {
        &self.settings
    }

    /// Number of settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Whether the schema declares no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

fn parse_definition(idx: usize, item: &Value) -> PluginResult<SettingDefinition> {
    let obj = item
        .as_object()
        .ok_or_else(|| PluginError::InvalidSettings(format!("setting {idx} must be an object")))?;

    let string_field = |field: &str| -> PluginResult<String> {
        match obj.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(PluginError::InvalidSettings(format!(
                "setting {idx}: '{field}' must be a string"
            ))),
            None => Err(PluginError::InvalidSettings(format!(
                "setting {idx}: missing required field '{field}'"
            ))),
        }
    };
    let bool_field = |field: &str| -> PluginResult<bool> {
        match obj.get(field) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(PluginError::InvalidSettings(format!(
                "setting {idx}: '{field}' must be a boolean"
            ))),
        }
    };

    let key = string_field("key")?;
    let type_name = string_field("type")?;
    let description = string_field("description")?;

    let setting_type = SettingType::parse(&type_name).ok_or_else(|| {
        PluginError::InvalidSettings(format!(
            "setting '{key}': unknown type '{type_name}' (expected str, int, float, bool, list or dict)"
        ))
    })?;

    let name = match obj.get("name") {
        None | Some(Value::Null) => key.clone(),
        Some(_) => string_field("name")?,
    };

    Ok(SettingDefinition {
        key,
        name,
        setting_type,
        default: obj.get("default").cloned(),
        description,
        required: bool_field("required")?,
        sensitive: bool_field("sensitive")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> SettingsSchema {
        SettingsSchema::new(vec![
            SettingDefinition::new("max_results", SettingType::Int, "Maximum results")
                .with_default(json!(10)),
            SettingDefinition::new("api_key", SettingType::Str, "API key")
                .required()
                .sensitive(),
            SettingDefinition::new("tags", SettingType::List, "Tags"),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = SettingsSchema::new(vec![
            SettingDefinition::new("a", SettingType::Str, "first"),
            SettingDefinition::new("a", SettingType::Int, "second"),
        ]);
        assert!(matches!(result, Err(PluginError::InvalidSettings(m)) if m.contains("duplicate")));
    }

    #[test]
    fn test_mistyped_default_rejected() {
        let result = SettingsSchema::new(vec![
            SettingDefinition::new("n", SettingType::Int, "count").with_default(json!("ten")),
        ]);
        assert!(result.is_err());

        // Integers are valid floats.
        let ok = SettingsSchema::new(vec![
            SettingDefinition::new("t", SettingType::Float, "temperature").with_default(json!(1)),
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_from_value() {
        let parsed = SettingsSchema::from_value(&json!([
            {"key": "max_results", "type": "int", "default": 5, "description": "Max"},
            {"key": "token", "name": "Token", "type": "str", "description": "Auth", "sensitive": true},
        ]))
        .unwrap();

        assert_eq!(parsed.len(), 2);
        let max = parsed.get("max_results").unwrap();
        assert_eq!(max.name, "max_results");
        assert_eq!(max.setting_type, SettingType::Int);
        assert!(!max.required);
        let token = parsed.get("token").unwrap();
        assert_eq!(token.name, "Token");
        assert!(token.sensitive);
    }

    #[test]
    fn test_from_value_rejections() {
        let cases = [
            json!({"key": "a"}),
            json!([{"type": "str", "description": "no key"}]),
            json!([{"key": "a", "description": "no type"}]),
            json!([{"key": "a", "type": "str"}]),
            json!([{"key": "a", "type": "tuple", "description": "bad type"}]),
            json!([{"key": "a", "type": "str", "description": "d", "required": "yes"}]),
            json!([{"key": "a", "type": "bool", "description": "d", "default": 1}]),
            json!([
                {"key": "a", "type": "str", "description": "d"},
                {"key": "a", "type": "str", "description": "d"},
            ]),
        ];
        for case in cases {
            assert!(SettingsSchema::from_value(&case).is_err(), "{case}");
        }
    }

    #[test]
    fn test_resolve() {
        let schema = schema();
        let mut overrides = Map::new();
        overrides.insert("api_key".into(), json!("secret"));
        overrides.insert("extra".into(), json!(true));

        let resolved = schema.resolve(&overrides).unwrap();
        assert_eq!(resolved["max_results"], json!(10));
        assert_eq!(resolved["api_key"], json!("secret"));
        assert_eq!(resolved["extra"], json!(true));
        assert!(!resolved.contains_key("tags"));
    }

    #[test]
    fn test_resolve_missing_required() {
        let err = schema().resolve(&Map::new()).unwrap_err();
        assert!(matches!(err, PluginError::MissingSetting(k) if k == "api_key"));
    }

    #[test]
    fn test_resolve_rejects_mistyped_override() {
        let mut overrides = Map::new();
        overrides.insert("api_key".into(), json!("k"));
        overrides.insert("max_results".into(), json!("many"));
        assert!(schema().resolve(&overrides).is_err());
    }

    #[test]
    fn test_redact() {
        let mut values = Map::new();
        values.insert("api_key".into(), json!("secret"));
        values.insert("max_results".into(), json!(3));

        let redacted = schema().redact(&values);
        assert_eq!(redacted["api_key"], json!(REDACTED));
        assert_eq!(redacted["max_results"], json!(3));
    }

    #[test]
    fn test_merge_keeps_first_declaration() {
        let other = SettingsSchema::new(vec![
            SettingDefinition::new("max_results", SettingType::Str, "shadowed"),
            SettingDefinition::new("region", SettingType::Str, "Region"),
        ])
        .unwrap();

        let merged = schema().merge(&other);
        let keys: Vec<_> = merged.definitions().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["max_results", "api_key", "tags", "region"]);
        assert_eq!(merged.get("max_results").unwrap().setting_type, SettingType::Int);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value[0]["type"], json!("int"));
        assert_eq!(value[0]["name"], json!("max_results"));
        assert!(value[2].get("default").is_none());
    }
}
