//! ISO-8601 timestamp helpers.
//!
//! Records carry timestamps as strings, but peers are not consistent about
//! the exact shape: RFC 3339 with `Z` or an offset, Postgres-style
//! `2024-01-02 00:00:00+00`, naive date-times (read as UTC), plain dates,
//! and occasionally raw epoch milliseconds. Everything is reduced to epoch
//! milliseconds for comparison.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Returns the current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Returns the current time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a timestamp string into epoch milliseconds.
pub fn parse_str_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.timestamp_millis());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Parses a JSON value (string or epoch-millisecond number) into epoch milliseconds.
pub fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => parse_str_millis(s),
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Formats epoch milliseconds as an RFC 3339 UTC string.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn format_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Normalizes any accepted timestamp value to an RFC 3339 UTC string.
pub fn normalize(value: &Value) -> Option<String> {
    parse_millis(value).and_then(format_millis)
}
