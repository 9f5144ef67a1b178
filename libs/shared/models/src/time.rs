//! Clock-time (de)serialization helpers.
//!
//! The booking API speaks minute-granularity `HH:MM` strings, while
//! PostgREST returns `time` columns as `HH:MM:SS`. The serde module here
//! accepts both on input and always emits `HH:MM`.

use chrono::NaiveTime;

pub const HHMM: &str = "%H:%M";
pub const HHMMSS: &str = "%H:%M:%S";

/// Parse a clock time from either `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, HHMM)
        .or_else(|_| NaiveTime::parse_from_str(value, HHMMSS))
}

/// Format a clock time as `HH:MM`.
pub fn format_clock_time(time: &NaiveTime) -> String {
    time.format(HHMM).to_string()
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_clock_time(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock_time(&raw).map_err(de::Error::custom)
    }
}
