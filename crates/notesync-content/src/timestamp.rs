//! Timestamp normalization.
//!
//! Frontmatter written by older versions or by hand carries timestamps in
//! several shapes. Everything is normalized to a UTC instant before it is
//! compared, and written back in one canonical form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fmt::Write;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a stored timestamp into a UTC instant.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` with an optional offset, the same
/// without seconds, and bare dates (midnight UTC). Naive values are read as
/// UTC. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical stored form: RFC 3339, UTC, whole seconds.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats a timestamp for display with a chrono strftime pattern.
///
/// An empty pattern, or one chrono cannot render, falls back to
/// [`format_timestamp`].
pub fn format_display(dt: &DateTime<Utc>, pattern: &str) -> String {
    if pattern.is_empty() {
        return format_timestamp(dt);
    }
    let mut out = String::new();
    if write!(out, "{}", dt.format(pattern)).is_err() {
        tracing::warn!(pattern, "Invalid date format, using RFC 3339");
        return format_timestamp(dt);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[rstest]
    #[case("2024-01-15T10:00:00Z", at(2024, 1, 15, 10, 0, 0))]
    #[case("\"2024-01-15T12:00:00+02:00\"", at(2024, 1, 15, 10, 0, 0))]
    #[case("2024-01-15 10:00:00", at(2024, 1, 15, 10, 0, 0))]
    #[case("2024-01-15 10:00", at(2024, 1, 15, 10, 0, 0))]
    #[case("2024-01-15T10:00:00.250", at(2024, 1, 15, 10, 0, 0) + chrono::Duration::milliseconds(250))]
    #[case("2024-01-15", at(2024, 1, 15, 0, 0, 0))]
    fn test_parse_timestamp(#[case] input: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(parse_timestamp(input), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("15/01/2024")]
    fn test_parse_timestamp_rejects(#[case] input: &str) {
        assert_eq!(parse_timestamp(input), None);
    }

    #[test]
    fn test_format_round_trips() {
        let dt = at(2024, 1, 15, 10, 0, 0);
        assert_eq!(format_timestamp(&dt), "2024-01-15T10:00:00Z");
        assert_eq!(parse_timestamp(&format_timestamp(&dt)), Some(dt));
    }

    #[test]
    fn test_format_display() {
        let dt = at(2024, 1, 15, 10, 0, 0);
        assert_eq!(format_display(&dt, "%Y-%m-%d"), "2024-01-15");
        assert_eq!(format_display(&dt, ""), "2024-01-15T10:00:00Z");
        assert_eq!(format_display(&dt, "%Q"), "2024-01-15T10:00:00Z");
    }
}
