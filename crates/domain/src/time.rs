//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for readings, actuator changes, notifications, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Build a [`TimeDelta`] from a whole number of seconds taken from configuration.
#[must_use]
pub fn seconds(secs: u32) -> TimeDelta {
    TimeDelta::seconds(i64::from(secs))
}
