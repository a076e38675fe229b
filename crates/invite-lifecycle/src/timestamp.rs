//! Tolerant timestamp representation.
//!
//! Persisted records have been written by several generations of clients, so
//! a date-valued field may arrive as:
//!
//! - a native timestamp (serialized as an RFC 3339 string),
//! - an epoch-seconds wrapper `{ "seconds": .., "nanoseconds": .. }`,
//! - an ISO-8601 string,
//! - a numeric epoch-millis value.
//!
//! Everything is normalized to epoch-millis before comparison. Outputs are
//! always ISO-8601 with millisecond precision and a `Z` suffix.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A date-valued field as it may appear in a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Integral epoch milliseconds.
    EpochMillis(i64),

    /// Non-integral epoch milliseconds (some clients write floats).
    FractionalMillis(f64),

    /// Epoch-seconds wrapper as produced by document-store SDKs.
    Seconds {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "nanoseconds", alias = "_nanoseconds")]
        nanos: i64,
    },

    /// Native timestamp written by this engine.
    Native(DateTime<Utc>),

    /// Any other string; parsed leniently on read.
    Text(String),
}

impl RawTimestamp {
    /// Normalize to epoch milliseconds.
    ///
    /// Returns `None` when the value cannot be interpreted as a point in time.
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            RawTimestamp::EpochMillis(ms) => Some(*ms),
            RawTimestamp::FractionalMillis(ms) => {
                if ms.is_finite() && ms.abs() < i64::MAX as f64 {
                    Some(ms.trunc() as i64)
                } else {
                    None
                }
            }
            RawTimestamp::Seconds { seconds, nanos } => seconds
                .checked_mul(1000)
                .and_then(|ms| ms.checked_add(nanos / 1_000_000)),
            RawTimestamp::Native(dt) => Some(dt.timestamp_millis()),
            RawTimestamp::Text(text) => parse_text_millis(text),
        }
    }

    /// Normalize to a UTC datetime.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.to_millis().and_then(DateTime::from_timestamp_millis)
    }

    /// Normalize to a UTC datetime, ignoring zero and negative epochs.
    ///
    /// Legacy writers used `0` as "unset", so only strictly positive values
    /// count as a real timestamp.
    pub fn to_positive_datetime(&self) -> Option<DateTime<Utc>> {
        match self.to_millis() {
            Some(ms) if ms > 0 => DateTime::from_timestamp_millis(ms),
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Native(dt)
    }
}

fn parse_text_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().timestamp_millis());
    }

    text.parse::<i64>().ok()
}

/// Format a datetime the way every external output expects it.
pub fn to_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter serializing `DateTime<Utc>` as ISO-8601 with milliseconds.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_iso8601(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::<Utc>::deserialize(deserializer)
    }

    /// Same as the parent module, for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_str(&crate::timestamp::to_iso8601(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<DateTime<Utc>>::deserialize(deserializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(json: &str) -> RawTimestamp {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_all_representations_normalize_to_same_instant() {
        let expected = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .unwrap()
            .timestamp_millis();

        assert_eq!(parse("1709294400000").to_millis(), Some(expected));
        assert_eq!(parse("1709294400000.0").to_millis(), Some(expected));
        assert_eq!(parse(r#"{"seconds": 1709294400}"#).to_millis(), Some(expected));
        assert_eq!(
            parse(r#"{"_seconds": 1709294400, "_nanoseconds": 0}"#).to_millis(),
            Some(expected)
        );
        assert_eq!(
            parse(r#""2024-03-01T12:00:00.000Z""#).to_millis(),
            Some(expected)
        );
        assert_eq!(
            parse(r#""2024-03-01T13:00:00+01:00""#).to_millis(),
            Some(expected)
        );
        assert_eq!(parse(r#""2024-03-01T12:00:00""#).to_millis(), Some(expected));
    }

    #[test]
    fn test_seconds_wrapper_keeps_sub_second_precision() {
        let ts = parse(r#"{"seconds": 10, "nanoseconds": 250000000}"#);
        assert_eq!(ts.to_millis(), Some(10_250));
    }

    #[test]
    fn test_garbage_is_not_a_timestamp() {
        assert_eq!(parse(r#""not a date""#).to_millis(), None);
        assert_eq!(parse(r#""""#).to_millis(), None);
    }

    #[test]
    fn test_zero_is_not_positive() {
        assert!(RawTimestamp::EpochMillis(0).to_positive_datetime().is_none());
        assert!(RawTimestamp::EpochMillis(-5).to_positive_datetime().is_none());
        assert!(RawTimestamp::EpochMillis(1).to_positive_datetime().is_some());
    }

    #[test]
    fn test_native_round_trips_through_json() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let json = serde_json::to_string(&RawTimestamp::from(dt)).unwrap();
        let back: RawTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_datetime(), Some(dt));
    }

    #[test]
    fn test_iso_output_format() {
        let dt = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(to_iso8601(&dt), "2025-01-02T03:04:05.000Z");
    }
}
