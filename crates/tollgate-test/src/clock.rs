//! A clock tests move by hand.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;
use std::time::Duration;

use tollgate_controller::Clock;

use crate::fixtures::test_epoch;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// A clock reading `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// A clock reading [`test_epoch`].
    #[must_use]
    pub fn at_epoch() -> Self {
        Self::new(test_epoch())
    }

    /// Jump to `now`.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }

    /// Move forward by `by`.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned or the result is out of range.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).expect("duration out of range");
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = now.checked_add_signed(delta).expect("time out of range");
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}
