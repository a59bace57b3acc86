//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that
//! no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `TOLLGATE_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TOLLGATE_DEFAULT_TIMEOUT_SECS",
        field_path: "approval.default_timeout_secs",
    },
    EnvMapping {
        var_name: "TOLLGATE_MAX_CONFLICT_RETRIES",
        field_path: "client.max_conflict_retries",
    },
    EnvMapping {
        var_name: "TOLLGATE_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "TOLLGATE_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// a config file.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Set a dotted `section.key` field in the TOML tree, creating the section
/// table if needed.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    let Some(root_table) = root.as_table_mut() else {
        return;
    };
    let section_val = root_table
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(table) = section_val.as_table_mut() {
        table.insert(key.to_owned(), coerce_to_toml_value(path, val));
    }
}

/// Coerce a string env var value to the TOML type of the target field.
/// Values that fail to parse stay strings and are reported at deserialize
/// time.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if matches!(
        path,
        "approval.default_timeout_secs" | "client.max_conflict_retries"
    ) && let Ok(i) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(i);
    }

    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
