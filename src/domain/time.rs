//! UTC timestamp handling for the persisted schema.
//!
//! Every timestamp crossing the persistence boundary is an ISO-8601 UTC
//! string of the exact form `YYYY-MM-DDTHH:MM:SSZ`. This module pins that
//! format down in one place so the store and the cache cannot drift.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::DomainError;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a UTC timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Sub-second precision is truncated; the persisted schema does not carry it.
pub fn format_utc(t: DateTime<Utc>) -> String {
    t.format(FORMAT).to_string()
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
///
/// # Examples
///
/// ```
/// use intermodal_router::domain::time::{format_utc, parse_utc};
///
/// let t = parse_utc("2025-11-15T08:00:00Z").unwrap();
/// assert_eq!(format_utc(t), "2025-11-15T08:00:00Z");
///
/// assert!(parse_utc("2025-11-15 08:00:00").is_err());
/// assert!(parse_utc("not a time").is_err());
/// ```
pub fn parse_utc(s: &str) -> Result<DateTime<Utc>, DomainError> {
    NaiveDateTime::parse_from_str(s, FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DomainError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trip() {
        let t = Utc.with_ymd_and_hms(2025, 11, 15, 8, 0, 0).unwrap();
        let s = format_utc(t);
        assert_eq!(s, "2025-11-15T08:00:00Z");
        assert_eq!(parse_utc(&s).unwrap(), t);
    }

    #[test]
    fn truncates_subseconds() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(format_utc(t), "2025-01-02T03:04:05Z");
    }

    #[test]
    fn rejects_offset_forms() {
        assert!(parse_utc("2025-11-15T08:00:00+00:00").is_err());
        assert!(parse_utc("2025-11-15T08:00:00").is_err());
        assert!(parse_utc("").is_err());
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(parse_utc("2025-13-01T00:00:00Z").is_err());
        assert!(parse_utc("2025-01-01T25:00:00Z").is_err());
    }
}
