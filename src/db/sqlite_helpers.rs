//! SQLite helper utilities for type conversion
//!
//! SQLite has no timestamp type; timestamps are stored as RFC 3339 text with
//! millisecond precision and a `Z` suffix so they sort lexicographically.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current timestamp as ISO8601 string
#[inline]
pub fn now_iso8601() -> String {
    datetime_to_str(Utc::now())
}

/// Convert a chrono DateTime to ISO8601 string
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
