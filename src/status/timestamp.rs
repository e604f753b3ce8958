//! # Timestamps
//!
//! Status documents carry second-resolution UTC timestamps rendered as
//! `YYYY-MM-DDTHH:MM:SSZ`. The Unix epoch doubles as the "not yet known"
//! sentinel.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Second-resolution UTC timestamp used throughout status documents
pub type Timestamp = DateTime<Utc>;

/// ISO-8601 layout without fractional seconds
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// HTTP-date layout used for `Last-Modified` headers
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Timestamp reported when no real time is known yet.
#[must_use]
pub fn sentinel() -> Timestamp {
    DateTime::<Utc>::default()
}

/// Returns true if `ts` is the epoch sentinel.
#[must_use]
pub fn is_sentinel(ts: &Timestamp) -> bool {
    ts.timestamp() == 0
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn to_iso(ts: &Timestamp) -> String {
    ts.format(ISO_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
#[must_use]
pub fn from_iso(value: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(value, ISO_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp for HTTP caching headers.
#[must_use]
pub fn to_http_date(ts: &Timestamp) -> String {
    ts.format(HTTP_DATE_FORMAT).to_string()
}

/// Serde adapter for `Timestamp` fields.
pub mod iso8601 {
    use super::{from_iso, to_iso, Timestamp};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        from_iso(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    /// Same as the parent module for `Option<Timestamp>` fields.
    pub mod option {
        use super::super::{from_iso, to_iso, Timestamp};
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<Timestamp>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&to_iso(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Timestamp>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => from_iso(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
                None => Ok(None),
            }
        }
    }
}
