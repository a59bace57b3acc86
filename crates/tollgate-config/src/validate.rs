//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest accepted default timeout (30 days).
const MAX_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound on conflict retries.
const MAX_CONFLICT_RETRIES: u32 = 100;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_approval(config)?;
    validate_client(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    if config.approval.default_timeout_secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::ValidationError {
            field: "approval.default_timeout_secs".to_owned(),
            message: format!(
                "timeout {} exceeds the maximum of {MAX_TIMEOUT_SECS} seconds",
                config.approval.default_timeout_secs
            ),
        });
    }
    Ok(())
}

fn validate_client(config: &Config) -> ConfigResult<()> {
    if config.client.max_conflict_retries > MAX_CONFLICT_RETRIES {
        return Err(ConfigError::ValidationError {
            field: "client.max_conflict_retries".to_owned(),
            message: format!("max_conflict_retries must be at most {MAX_CONFLICT_RETRIES}"),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    if let Some(bad) = config.logging.directives.iter().find(|d| d.trim().is_empty()) {
        return Err(ConfigError::ValidationError {
            field: "logging.directives".to_owned(),
            message: format!("empty directive '{bad}'"),
        });
    }

    Ok(())
}
