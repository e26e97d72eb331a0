//! Tracker timestamp parsing.
//!
//! Tracker exports carry offsets and fractional seconds
//! (`2025-01-02T10:15:00.000+0000`). Only the wall-clock prefix
//! (`%Y-%m-%dT%H:%M:%S`) is kept; day bucketing happens on that value.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const WALL_CLOCK_LEN: usize = 19;

/// Parse the wall-clock prefix of a tracker timestamp.
///
/// Returns `None` when the input is shorter than a full date-time or the
/// prefix is not a valid date-time.
#[must_use]
pub fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let prefix = raw.trim().get(..WALL_CLOCK_LEN)?;
    NaiveDateTime::parse_from_str(prefix, WALL_CLOCK_FORMAT).ok()
}

/// Render a timestamp in the same wall-clock form it was parsed from.
#[must_use]
pub fn format_wall_clock(ts: &NaiveDateTime) -> String {
    ts.format(WALL_CLOCK_FORMAT).to_string()
}

/// Serde `with` module for required timestamps.
pub mod required {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wall_clock(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wall_clock(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// Serde `with` module for timestamps whose absence is a data condition
/// rather than a parse failure. Unparsable values become `None`.
pub mod lenient {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer};

    #[allow(clippy::ref_option)] // signature fixed by serde's `with` protocol
    pub fn serialize<S: Serializer>(
        ts: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&super::format_wall_clock(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_wall_clock))
    }
}
