//! Timestamp utilities
//!
//! All wire timestamps are milliseconds since the UNIX epoch as `i64`, so that
//! offsets and deltas can be negative without extra casting.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time in epoch milliseconds
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert milliseconds to duration, clamping negative values to zero
pub fn millis_to_duration(millis: i64) -> std::time::Duration {
    std::time::Duration::from_millis(millis.max(0) as u64)
}

/// Convert a millisecond delta to fractional seconds
pub fn millis_to_secs(millis: i64) -> f64 {
    millis as f64 / 1000.0
}
