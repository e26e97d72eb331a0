use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::unit::Unit;

/// Batch metadata as listed by the tracker (one epic per order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub key: String,
    #[serde(default)]
    pub title: String,
    /// Authoritative start day. Accepts a bare date or a full timestamp.
    #[serde(deserialize_with = "deserialize_day")]
    pub anchor_date: NaiveDate,
}

/// A named collection of units processed together, anchored to a start day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub key: String,
    pub title: String,
    pub anchor: NaiveDate,
    pub primary: Vec<Unit>,
    pub secondary: Vec<Unit>,
}

impl Batch {
    /// An empty batch; units arrive through [`Batch::replace_units`].
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>, anchor: NaiveDate) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            anchor,
            primary: Vec::new(),
            secondary: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_meta(meta: &BatchMeta) -> Self {
        Self::new(meta.key.clone(), meta.title.clone(), meta.anchor_date)
    }

    /// Replace both unit collections wholesale, partitioning by kind.
    pub fn replace_units(&mut self, units: impl IntoIterator<Item = Unit>) {
        let (primary, secondary): (Vec<Unit>, Vec<Unit>) =
            units.into_iter().partition(|unit| unit.kind.is_primary());
        self.primary = primary;
        self.secondary = secondary;
    }

    /// Builder-style variant of [`Batch::replace_units`].
    #[must_use]
    pub fn with_units(mut self, units: impl IntoIterator<Item = Unit>) -> Self {
        self.replace_units(units);
        self
    }

    /// Every unit, primary first.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.primary.iter().chain(self.secondary.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

fn deserialize_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid anchor date '{raw}'")))
}
