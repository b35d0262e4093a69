//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Log formats understood by the telemetry layer.
pub const KNOWN_LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_plugins(config)?;
    validate_installer(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_plugins(config: &Config) -> ConfigResult<()> {
    let p = &config.plugins;

    for (field, paths) in [
        ("plugins.search_paths", &p.search_paths),
        ("plugins.module_search_paths", &p.module_search_paths),
    ] {
        if let Some(idx) = paths.iter().position(|path| path.as_os_str().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: format!("entry {idx} is an empty path"),
            });
        }
    }

    Ok(())
}

fn validate_installer(config: &Config) -> ConfigResult<()> {
    if config.installer.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "installer.timeout_secs".to_owned(),
            message: "timeout must be at least 1 second".to_owned(),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if l.level.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: "level must not be empty".to_owned(),
        });
    }

    let format = l.format.trim().to_ascii_lowercase();
    if !KNOWN_LOG_FORMATS.contains(&format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                KNOWN_LOG_FORMATS.join(", ")
            ),
        });
    }

    Ok(())
}
