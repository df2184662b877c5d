//! SQLite-compatible timestamps.
//!
//! All times are stored as `YYYY-MM-DD HH:MM:SS` UTC text, the same format
//! `datetime('now')` produces, so they compare correctly as strings.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current time in SQLite datetime format.
pub fn datetime_now() -> String {
    timestamp_to_datetime(unix_now())
}

/// `now + offset` in SQLite datetime format.
pub fn datetime_after(offset: Duration) -> String {
    timestamp_to_datetime(unix_now().saturating_add(offset.as_secs()))
}

/// `now - offset` in SQLite datetime format.
pub fn datetime_before(offset: Duration) -> String {
    timestamp_to_datetime(unix_now().saturating_sub(offset.as_secs()))
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
pub fn timestamp_to_datetime(timestamp: u64) -> String {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since Unix epoch to year, month, day.
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from http://howardhinnant.github.io/date_algorithms.html
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
