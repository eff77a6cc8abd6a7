//! Time helpers
//!
//! All notification timestamps are Unix milliseconds (`i64`), the
//! resolution at which same-instant arrivals are still distinguishable by
//! insertion order.

use chrono::Utc;

/// Unix milliseconds timestamp.
pub type UnixMillis = i64;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> UnixMillis {
    Utc::now().timestamp_millis()
}
