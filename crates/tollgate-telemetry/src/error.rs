//! Telemetry error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Invalid level, directive or format name.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A global subscriber is already installed, or installation failed.
    #[error("Initialization error: {0}")]
    InitError(String),

    /// The log directory could not be created.
    #[error("failed to create log directory {}: {source}", path.display())]
    LogDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
