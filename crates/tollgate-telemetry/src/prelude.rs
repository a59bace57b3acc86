//! Commonly used types.
//!
//! ```rust,no_run
//! use tollgate_telemetry::prelude::*;
//!
//! # fn main() -> TelemetryResult<()> {
//! setup_logging(&LogConfig::new("debug").with_format(LogFormat::Json))?;
//!
//! let _guard = RequestGuard::new(
//!     RequestContext::new("admission").with_task("deploy-gate"),
//! );
//! tracing::info!("reviewing update");
//! # Ok(())
//! # }
//! ```

pub use crate::{TelemetryError, TelemetryResult};

pub use crate::{LogConfig, LogFormat, LogTarget};

pub use crate::{setup_default_logging, setup_logging};

pub use crate::{RequestContext, RequestGuard};
