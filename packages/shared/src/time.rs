//! Timestamp helpers.
//!
//! The chat backend exchanges ISO-8601 strings. Outbound frames always carry
//! an explicit UTC offset; inbound frames may omit it.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Get the current time in UTC.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format a UTC time as ISO-8601 with millisecond precision (`...Z`).
pub fn to_iso8601(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 strings with an offset, and offset-less local date-times
/// (`2024-05-01T10:15:30` or with fractional seconds), which are read as UTC.
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
