//! Structural checks for plugins before they are registered.

use std::collections::HashSet;

use semver::{Comparator, Op, Version, VersionReq};

use crate::plugin::Plugin;
use crate::version::parse_version;

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether no problem was found.
    pub valid: bool,
    /// Human-readable problems, in the order they were found.
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

impl From<ValidationReport> for (bool, Vec<String>) {
    fn from(report: ValidationReport) -> Self {
        (report.valid, report.errors)
    }
}

/// Check the plugin's metadata without creating an agent.
#[must_use]
pub fn validate_plugin_structure_shallow(plugin: &dyn Plugin) -> ValidationReport {
    ValidationReport::from_errors(metadata_errors(plugin))
}

/// Full check: metadata, agent creation, tools, system prompt, SDK
/// requirement and runtime dependencies.
#[must_use]
pub fn validate_plugin_structure(plugin: &dyn Plugin) -> ValidationReport {
    let mut errors = metadata_errors(plugin);
    if !errors.is_empty() {
        return ValidationReport::from_errors(errors);
    }

    let agent = match plugin.create_agent() {
        Ok(agent) => agent,
        Err(e) => {
            errors.push(format!("Error calling create_agent(): {e}"));
            return ValidationReport::from_errors(errors);
        },
    };

    let mut seen = HashSet::new();
    for (idx, tool) in agent.tools().iter().enumerate() {
        if tool.name().trim().is_empty() {
            errors.push(format!("Tool at index {idx} has an empty name"));
        } else if !seen.insert(tool.name().to_string()) {
            errors.push(format!("Duplicate tool name: {}", tool.name()));
        }
    }

    if agent.system_prompt().trim().is_empty() {
        errors.push("Agent system prompt is empty".to_string());
    }

    if let Ok(metadata) = plugin.metadata()
        && metadata.sdk_version().trim().is_empty()
    {
        errors.push("Plugin metadata must specify sdk_version".to_string());
    }

    errors.extend(
        plugin
            .validate_dependencies()
            .into_iter()
            .map(|e| format!("Dependency error: {e}")),
    );

    ValidationReport::from_errors(errors)
}

fn metadata_errors(plugin: &dyn Plugin) -> Vec<String> {
    let metadata = match plugin.metadata() {
        Ok(metadata) => metadata,
        Err(e) => return vec![format!("Error calling metadata(): {e}")],
    };

    let mut errors = Vec::new();
    for (field, value) in [
        ("pid", metadata.pid()),
        ("name", metadata.name()),
        ("version", metadata.version()),
        ("description", metadata.description()),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("Plugin metadata must have non-empty '{field}'"));
        }
    }
    if parse_version(metadata.version()).is_none() {
        errors.push(format!("Invalid version format: {}", metadata.version()));
    }
    errors
}

/// Check that `current` satisfies the requirement `required`.
///
/// Requirements are comma-separated clauses such as `">=2.0.0,<3.0.0"`,
/// each an operator followed by a version. `==`, `!=`, `>=`, `<=`, `>`,
/// `<` and `~=` follow package-index semantics: `~=2.1` means
/// `>=2.1.0, <3.0.0` and `~=2.1.4` means `>=2.1.4, <2.2.0`. Semver `^`,
/// `~` and `=` are accepted as well, and `==2.*` style wildcards match a
/// whole series. A bare version with no operator is rejected. An empty
/// requirement matches every version.
#[must_use]
pub fn validate_sdk_version_compatibility(required: &str, current: &str) -> ValidationReport {
    let mut comparators = Vec::new();
    let mut excluded = Vec::new();
    for clause in required.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        match translate_clause(clause) {
            Ok(Clause::Allow(mut allowed)) => comparators.append(&mut allowed),
            Ok(Clause::Exclude(version)) => excluded.push(version),
            Err(e) => {
                return ValidationReport::from_errors(vec![format!(
                    "Error checking version compatibility: invalid requirement '{required}': {e}"
                )]);
            },
        }
    }
    let Some(version) = parse_version(current) else {
        return ValidationReport::from_errors(vec![format!(
            "Error checking version compatibility: invalid version '{current}'"
        )]);
    };

    if (VersionReq { comparators }).matches(&version) && !excluded.contains(&version) {
        ValidationReport::from_errors(Vec::new())
    } else {
        ValidationReport::from_errors(vec![format!(
            "SDK version {current} does not satisfy requirement {required}"
        )])
    }
}

enum Clause {
    Allow(Vec<Comparator>),
    Exclude(Version),
}

fn translate_clause(clause: &str) -> Result<Clause, String> {
    let split = clause
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(clause.len());
    let (op, operand) = clause.split_at(split);
    let (op, operand) = (op.trim(), operand.trim());

    if operand.contains('*') {
        if !matches!(op, "==" | "=") {
            return Err(format!("wildcard '{operand}' needs '=='"));
        }
        return Comparator::parse(operand)
            .map(|c| Clause::Allow(vec![c]))
            .map_err(|e| e.to_string());
    }

    let version = || parse_version(operand).ok_or_else(|| format!("invalid version '{operand}'"));
    let single = |op: Op| version().map(|v| Clause::Allow(vec![comparator(op, &v)]));
    match op {
        "==" | "===" | "=" => single(Op::Exact),
        "!=" => version().map(Clause::Exclude),
        ">=" => single(Op::GreaterEq),
        "<=" => single(Op::LessEq),
        ">" => single(Op::Greater),
        "<" => single(Op::Less),
        "^" => single(Op::Caret),
        "~" => single(Op::Tilde),
        "~=" => compatible_release(operand, &version()?),
        "" => Err(format!("'{clause}' has no comparison operator")),
        other => Err(format!("unknown operator '{other}'")),
    }
}

/// `~=X.Y` pins the major version, `~=X.Y.Z` pins the minor version.
fn compatible_release(operand: &str, lower: &Version) -> Result<Clause, String> {
    let overflow = || format!("version '{operand}' is out of range");
    let components = operand
        .trim_start_matches(['v', 'V'])
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()
        .unwrap_or_default()
        .trim_end_matches('.')
        .split('.')
        .count();
    let upper = match components {
        2 => Version::new(lower.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
        3 => Version::new(lower.major, lower.minor.checked_add(1).ok_or_else(overflow)?, 0),
        _ => return Err(format!("'~={operand}' needs two or three release components")),
    };
    Ok(Clause::Allow(vec![
        comparator(Op::GreaterEq, lower),
        comparator(Op::Less, &upper),
    ]))
}

fn comparator(op: Op, version: &Version) -> Comparator {
    Comparator {
        op,
        major: version.major,
        minor: Some(version.minor),
        patch: Some(version.patch),
        pre: version.pre.clone(),
    }
}
