//! Injectable wall clock.

use chrono::{DateTime, Utc};
use std::fmt;

/// Source of the current time.
///
/// The reconciler never calls `Utc::now()` directly; tests inject a clock
/// they can move by hand.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
