//! Timestamp decoding shared by the provider decoders.
//!
//! Providers disagree on the wire format of timestamps. Every accepted form is
//! converted to UTC epoch seconds, floored to whole seconds.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Legacy GitLab payloads, e.g. `2013-12-03 17:23:34 UTC`
const GITLAB_LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
/// Bitbucket Server event dates, e.g. `2017-09-19T09:58:11+1000`
const COMPACT_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Parses a textual timestamp into UTC epoch seconds.
pub fn parse_epoch_seconds(value: &str) -> Option<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.timestamp());
    }
    if let Ok(datetime) = DateTime::parse_from_str(value, COMPACT_OFFSET_FORMAT) {
        return Some(datetime.timestamp());
    }
    NaiveDateTime::parse_from_str(value, GITLAB_LEGACY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// Converts epoch milliseconds to epoch seconds, flooring negative values.
pub fn millis_to_seconds(millis: i64) -> i64 {
    millis.div_euclid(1000)
}

/// Deserializes an optional textual timestamp into epoch seconds.
///
/// Absent or `null` values become `None`. A present value in an unknown
/// format fails the whole decode.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) => parse_epoch_seconds(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_utc() {
        assert_eq!(parse_epoch_seconds("2024-01-01T00:00:00Z"), Some(1704067200));
    }

    #[test]
    fn rfc3339_with_offset_converts_to_utc() {
        assert_eq!(
            parse_epoch_seconds("2024-01-01T02:00:00+02:00"),
            Some(1704067200)
        );
    }

    #[test]
    fn fractional_seconds_are_truncated() {
        assert_eq!(
            parse_epoch_seconds("2024-02-02T12:00:00.999999+00:00"),
            Some(1706875200)
        );
    }

    #[test]
    fn compact_offset() {
        assert_eq!(
            parse_epoch_seconds("2024-01-01T10:00:00+1000"),
            Some(1704067200)
        );
    }

    #[test]
    fn gitlab_legacy_format() {
        assert_eq!(parse_epoch_seconds("2024-01-01 00:00:00 UTC"), Some(1704067200));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_epoch_seconds("yesterday"), None);
        assert_eq!(parse_epoch_seconds(""), None);
    }

    #[test]
    fn millis_floor() {
        assert_eq!(millis_to_seconds(1704067200999), 1704067200);
        assert_eq!(millis_to_seconds(-1), -1);
    }
}
