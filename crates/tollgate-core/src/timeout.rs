//! Deadline evaluation for pending tasks.
//!
//! These functions never read the clock; `now` is always supplied by the
//! caller.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Deadline applied when a task does not specify one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Whether a task started at `start` has exceeded `deadline` at `now`.
///
/// A zero deadline disables the timeout.
#[must_use]
pub fn has_timed_out(start: DateTime<Utc>, now: DateTime<Utc>, deadline: Duration) -> bool {
    if deadline.is_zero() {
        return false;
    }
    let Ok(elapsed) = now.signed_duration_since(start).to_std() else {
        // `now` before `start`: clock skew, treat as not elapsed.
        return false;
    };
    elapsed > deadline
}

/// Time left until the deadline, or `None` when there is no deadline or it
/// has already passed. At exactly the deadline this is `Some(0)`, since the
/// task only times out once the deadline is exceeded.
#[must_use]
pub fn remaining(start: DateTime<Utc>, now: DateTime<Utc>, deadline: Duration) -> Option<Duration> {
    if deadline.is_zero() {
        return None;
    }
    let elapsed = now
        .signed_duration_since(start)
        .to_std()
        .unwrap_or(Duration::ZERO);
    deadline.checked_sub(elapsed)
}

/// Status reason recorded when a task is rejected by timeout.
#[must_use]
pub fn timeout_reason(task_name: &str) -> String {
    format!("Approval task {task_name} is failed because of timeout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, second).unwrap()
    }

    #[test]
    fn test_not_timed_out_before_deadline() {
        assert!(!has_timed_out(at(0, 0), at(59, 59), DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_exact_deadline_is_not_timeout() {
        let deadline = Duration::from_secs(300);
        assert!(!has_timed_out(at(0, 0), at(5, 0), deadline));
        assert!(has_timed_out(at(0, 0), at(5, 1), deadline));
    }

    #[test]
    fn test_zero_deadline_disables_timeout() {
        assert!(!has_timed_out(at(0, 0), at(59, 0), Duration::ZERO));
        assert_eq!(remaining(at(0, 0), at(59, 0), Duration::ZERO), None);
    }

    #[test]
    fn test_clock_skew_is_not_timeout() {
        assert!(!has_timed_out(at(10, 0), at(0, 0), Duration::from_secs(1)));
    }

    #[test]
    fn test_remaining() {
        let deadline = Duration::from_secs(600);
        assert_eq!(
            remaining(at(0, 0), at(4, 0), deadline),
            Some(Duration::from_secs(360))
        );
        assert_eq!(
            remaining(at(0, 0), at(10, 0), deadline),
            Some(Duration::ZERO)
        );
        assert_eq!(remaining(at(0, 0), at(10, 1), deadline), None);
        assert_eq!(remaining(at(0, 0), at(20, 0), deadline), None);
        assert_eq!(remaining(at(5, 0), at(0, 0), deadline), Some(deadline));
    }

    #[test]
    fn test_timeout_reason() {
        assert_eq!(
            timeout_reason("deploy-gate"),
            "Approval task deploy-gate is failed because of timeout"
        );
    }
}
