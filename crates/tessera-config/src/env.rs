//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that no
//! config file set.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::{debug, warn};

use crate::merge::{ConfigLayer, FieldSources};

#[derive(Clone, Copy)]
enum FieldKind {
    Str,
    Int,
    Bool,
    PathList,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: FieldKind,
}

/// All supported `TESSERA_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TESSERA_LOG_LEVEL",
        field_path: "logging.level",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "TESSERA_LOG_FORMAT",
        field_path: "logging.format",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "TESSERA_PLUGIN_PATHS",
        field_path: "plugins.search_paths",
        kind: FieldKind::PathList,
    },
    EnvMapping {
        var_name: "TESSERA_INSTALL_TIMEOUT_SECS",
        field_path: "installer.timeout_secs",
        kind: FieldKind::Int,
    },
    EnvMapping {
        var_name: "TESSERA_AUTO_INSTALL",
        field_path: "installer.auto_install",
        kind: FieldKind::Bool,
    },
];

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Apply environment variable fallbacks to fields that no config file set.
///
/// Values that cannot be coerced to the field's type are ignored with a
/// warning. Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(|layer| layer.is_file())
        {
            continue;
        }

        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let Some(value) = coerce(mapping.kind, raw) else {
            warn!(
                var = mapping.var_name,
                value = %raw,
                "ignoring env var with invalid value"
            );
            continue;
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

fn coerce(kind: FieldKind, raw: &str) -> Option<toml::Value> {
    match kind {
        FieldKind::Str => Some(toml::Value::String(raw.to_owned())),
        FieldKind::Int => raw.trim().parse::<i64>().ok().map(toml::Value::Integer),
        FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Some(toml::Value::Boolean(false)),
            _ => None,
        },
        FieldKind::PathList => {
            let paths = std::env::split_paths(raw)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| toml::Value::String(p.display().to_string()))
                .collect();
            Some(toml::Value::Array(paths))
        },
    }
}

/// Set a dotted field path in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}
