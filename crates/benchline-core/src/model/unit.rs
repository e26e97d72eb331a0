use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::timestamp;

/// The two classes of tracked unit.
///
/// Hashboards are the primary units whose states are tracked in full.
/// Chassis are secondary units tracked only for a configured subset of
/// states.
///
/// Deserialization goes through [`FromStr`], so tracker issue types such as
/// `"Task"` load as hashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum UnitKind {
    #[default]
    Hashboard,
    Chassis,
}

impl UnitKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Hashboard => "hashboard",
            Self::Chassis => "chassis",
        }
    }

    /// Whether this is the primary (fully tracked) class.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Hashboard)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashboard" | "task" => Ok(Self::Hashboard),
            "chassis" => Ok(Self::Chassis),
            _ => Err(ParseEnumError {
                expected: "unit kind",
                got: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for UnitKind {
    type Error = ParseEnumError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

/// One observed status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// `None` for the very first transition out of creation.
    #[serde(default)]
    pub from: Option<String>,
    pub to: String,
    #[serde(with = "timestamp::required")]
    pub timestamp: NaiveDateTime,
    #[serde(default = "unknown_author")]
    pub author: String,
}

impl StatusChange {
    /// Calendar day the transition landed on.
    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A free-text comment left on a unit's issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default = "unknown_author")]
    pub author: String,
    #[serde(with = "timestamp::required")]
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub body: String,
}

/// A trackable physical item as exported from the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Issue-tracker key (e.g. `RT-18231`).
    pub key: String,
    /// Stable physical identifier.
    pub serial: String,
    #[serde(default)]
    pub kind: UnitKind,
    #[serde(default, rename = "created_at", with = "timestamp::lenient")]
    pub created: Option<NaiveDateTime>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub board_model: Option<String>,
    #[serde(default)]
    pub repair_summary: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Unit {
    /// Calendar day the unit was created, if known.
    #[must_use]
    pub fn created_day(&self) -> Option<NaiveDate> {
        self.created.map(|ts| ts.date())
    }

    /// Status history sorted ascending by timestamp.
    ///
    /// The sort is stable, so transitions sharing a timestamp keep their
    /// input order and the later one in the list wins.
    #[must_use]
    pub fn sorted_history(&self) -> Vec<&StatusChange> {
        let mut history: Vec<&StatusChange> = self.status_history.iter().collect();
        history.sort_by_key(|change| change.timestamp);
        history
    }

    /// The chronologically last transition, if any.
    #[must_use]
    pub fn last_transition(&self) -> Option<&StatusChange> {
        self.sorted_history().pop()
    }

    /// Lightweight reference used in cohort lists.
    #[must_use]
    pub fn to_ref(&self) -> UnitRef {
        UnitRef {
            id: self.serial.clone(),
            assignee: self.assignee.clone(),
            model: self.board_model.clone(),
        }
    }
}

/// Cohort member: enough to label a unit in a chart tooltip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn unknown_author() -> String {
    "Unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_kind_parses_tracker_aliases() {
        assert_eq!(UnitKind::from_str("Task").ok(), Some(UnitKind::Hashboard));
        assert_eq!(UnitKind::from_str(" chassis ").ok(), Some(UnitKind::Chassis));
        assert!(UnitKind::from_str("epic").is_err());
        assert_eq!(UnitKind::Chassis.to_string(), "chassis");
    }

    #[test]
    fn unit_record_kind_accepts_tracker_issue_types() {
        let parse = |kind: &str| {
            let raw = format!(r#"{{"key": "RT-4", "serial": "HB-004", "kind": "{kind}"}}"#);
            serde_json::from_str::<Unit>(&raw).map(|unit| unit.kind)
        };
        assert_eq!(parse("Task").ok(), Some(UnitKind::Hashboard));
        assert_eq!(parse("Chassis").ok(), Some(UnitKind::Chassis));
        assert!(parse("Epic").is_err());

        let json = serde_json::to_value(UnitKind::Hashboard).expect("serialize");
        assert_eq!(json, "hashboard");
    }

    #[test]
    fn unit_record_defaults_optional_fields() {
        let raw = r#"{
            "key": "RT-1",
            "serial": "HB-001",
            "created_at": "2025-01-01T08:00:00.000+0000",
            "status_history": [
                {"to": "Backlog", "timestamp": "2025-01-01T09:00:00"}
            ]
        }"#;
        let unit: Unit = serde_json::from_str(raw).expect("record should parse");
        assert_eq!(unit.kind, UnitKind::Hashboard);
        assert!(unit.assignee.is_none());
        assert!(unit.comments.is_empty());
        assert_eq!(unit.status_history[0].author, "Unknown");
        assert!(unit.status_history[0].from.is_none());
        assert_eq!(
            unit.created_day(),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
    }

    #[test]
    fn garbled_creation_date_becomes_none() {
        let raw = r#"{"key": "RT-2", "serial": "HB-002", "created_at": "yesterday"}"#;
        let unit: Unit = serde_json::from_str(raw).expect("record should parse");
        assert!(unit.created.is_none());
    }

    #[test]
    fn last_transition_ignores_input_order() {
        let raw = r#"{
            "key": "RT-3",
            "serial": "HB-003",
            "created_at": "2025-01-01T08:00:00",
            "status_history": [
                {"to": "Done", "timestamp": "2025-01-05T09:00:00"},
                {"to": "Backlog", "timestamp": "2025-01-01T09:00:00"}
            ]
        }"#;
        let unit: Unit = serde_json::from_str(raw).expect("record should parse");
        assert_eq!(unit.last_transition().map(|c| c.to.as_str()), Some("Done"));
    }
}
