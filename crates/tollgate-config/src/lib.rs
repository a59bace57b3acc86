#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for Tollgate.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tollgate_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("tollgate.toml"))).unwrap();
//! println!("timeout: {:?}", resolved.config.approval.default_timeout());
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** passed to [`Config::load`]
//! 2. **Environment variables** (`TOLLGATE_*`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! This crate has no dependencies on other tollgate crates. Conversion to
//! domain types happens where the config is consumed.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Layered configuration merging with source tracking.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedConfig;
pub use merge::ConfigLayer;
pub use types::*;

impl Config {
    /// Load configuration from defaults, an optional file and `TOLLGATE_*`
    /// environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(path)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
