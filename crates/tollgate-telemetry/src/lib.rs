//! Tollgate Telemetry - logging setup and request correlation.
//!
//! This crate provides:
//! - Subscriber installation with compact, pretty, full or JSON output
//! - Daily-rotated file logging
//! - [`RequestContext`] spans that tag events with the task and principal
//!
//! With the `config` feature, a [`LogConfig`] can be built from the
//! `[logging]` section of a loaded `tollgate-config` file.
//!
//! # Example
//!
//! ```rust,no_run
//! use tollgate_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), tollgate_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tollgate_core=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("reconciler").with_task("ci/deploy-gate");
//! let span = ctx.span();
//! let _entered = span.enter();
//! tracing::info!("reconciling");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
