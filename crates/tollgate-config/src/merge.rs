//! Deep merge of TOML values with per-field source tracking.
//!
//! The merge operates on raw [`toml::Value`] trees rather than deserialized
//! structs, so a key missing from an overlay never resets the base value.

use std::collections::HashMap;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// An explicitly supplied config file.
    File,
    /// Environment variable fallback.
    Environment,
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::File => write!(f, "config file"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each field's value.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf
/// field.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer.clone());
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer.clone());
        },
    }
}

/// Walk a value tree and record all leaf paths with their source layer.
pub fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_overlay_replaces_scalars_and_keeps_missing_keys() {
        let mut base = parse("[logging]\nlevel = \"info\"\nformat = \"compact\"\n");
        let overlay = parse("[logging]\nlevel = \"debug\"\n");
        let mut sources = FieldSources::new();

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::File, &mut sources);

        assert_eq!(base["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(base["logging"]["format"].as_str(), Some("compact"));
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::File));
        assert!(!sources.contains_key("logging.format"));
    }

    #[test]
    fn test_new_tables_record_every_leaf() {
        let mut base = parse("[logging]\nlevel = \"info\"\n");
        let overlay = parse("[client]\nmax_conflict_retries = 2\n");
        let mut sources = FieldSources::new();

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::File, &mut sources);

        assert_eq!(base["client"]["max_conflict_retries"].as_integer(), Some(2));
        assert_eq!(
            sources.get("client.max_conflict_retries"),
            Some(&ConfigLayer::File)
        );
    }

    #[test]
    fn test_arrays_are_replaced() {
        let mut base = parse("[logging]\ndirectives = [\"a=debug\", \"b=info\"]\n");
        let overlay = parse("[logging]\ndirectives = [\"c=trace\"]\n");
        let mut sources = FieldSources::new();

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::File, &mut sources);

        let directives = base["logging"]["directives"].as_array().unwrap();
        assert_eq!(directives.len(), 1);
    }
}
