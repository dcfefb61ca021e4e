//! Time-related utility functions.
//!
//! Helpers for converting between wall-clock timestamps (`chrono`) and the
//! `std::time` types used for blocking waits.

use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time left until `deadline`, as a duration suitable for a blocking wait.
///
/// Returns [`Duration::ZERO`] when the deadline has already passed.
///
/// # Example
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use envmon::time::duration_until;
///
/// let now = Utc::now();
/// assert_eq!(duration_until(now - TimeDelta::seconds(5), now).as_secs(), 0);
/// assert_eq!(duration_until(now + TimeDelta::seconds(5), now).as_secs(), 5);
/// ```
pub fn duration_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Milliseconds since the UNIX epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
