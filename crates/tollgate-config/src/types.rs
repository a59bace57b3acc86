//! Configuration types for Tollgate.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Approval task policy.
    pub approval: ApprovalSection,
    /// Vote client behaviour.
    pub client: ClientSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// ApprovalSection
// ---------------------------------------------------------------------------

/// Approval task policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Seconds a task may stay pending before it is force-rejected.
    /// `0` disables the timeout.
    pub default_timeout_secs: u64,
}

impl ApprovalSection {
    /// The default timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: 3600,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientSection
// ---------------------------------------------------------------------------

/// Vote client behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// How many times a vote is re-read and re-admitted after losing a
    /// compare-and-swap race.
    pub max_conflict_retries: u32,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Per-crate tracing directives (e.g. `["tollgate_core=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_sections_use_defaults() {
        let config: Config = toml::from_str("[approval]\n[client]\n[logging]\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section() {
        let config: Config = toml::from_str("[approval]\ndefault_timeout_secs = 90\n").unwrap();
        assert_eq!(config.approval.default_timeout(), Duration::from_secs(90));
        assert_eq!(config.client.max_conflict_retries, 5);
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["logging"]["format"], "compact");
        assert_eq!(json["approval"]["default_timeout_secs"], 3600);
    }
}
