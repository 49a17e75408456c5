//! Wall-clock helpers.

use chrono::Utc;

/// Current Unix time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
