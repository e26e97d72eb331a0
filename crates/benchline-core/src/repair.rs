//! Repair-event view: what happened to each board, in order.
//!
//! Status changes and technician comments are merged into one stream. Each
//! status change carries how long the unit stayed in that state. The view
//! keeps only milestone transitions and readable comments, and only for
//! units that went all the way through the repair path.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Serialize, Serializer};

use crate::config::RepairConfig;
use crate::model::{Batch, Unit};

const NOT_AVAILABLE: &str = "N/A";

/// One entry of a unit's repair stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairEvent {
    StatusChange {
        timestamp: NaiveDateTime,
        author: String,
        from: Option<String>,
        to: String,
        /// Time until the next status change; `None` for the last one.
        #[serde(serialize_with = "serialize_seconds")]
        duration: Option<TimeDelta>,
    },
    Comment {
        timestamp: NaiveDateTime,
        author: String,
        body: String,
    },
}

impl RepairEvent {
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        match self {
            Self::StatusChange { timestamp, .. } | Self::Comment { timestamp, .. } => *timestamp,
        }
    }
}

/// Filtered repair stream for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairRecord {
    pub key: String,
    pub serial: String,
    pub board_model: String,
    pub repair_summary: String,
    pub events: Vec<RepairEvent>,
}

/// Every status change and comment of `unit`, in time order.
///
/// Durations are computed over the full status history before any
/// filtering, so a kept transition reports the time until the next
/// transition of any kind.
#[must_use]
pub fn event_stream(unit: &Unit) -> Vec<RepairEvent> {
    let history = unit.sorted_history();
    let mut events: Vec<RepairEvent> = history
        .iter()
        .enumerate()
        .map(|(idx, change)| RepairEvent::StatusChange {
            timestamp: change.timestamp,
            author: change.author.clone(),
            from: change.from.clone(),
            to: change.to.clone(),
            duration: history
                .get(idx + 1)
                .map(|next| next.timestamp - change.timestamp),
        })
        .collect();

    events.extend(unit.comments.iter().map(|comment| RepairEvent::Comment {
        timestamp: comment.timestamp,
        author: comment.author.clone(),
        body: comment.body.replace('\n', "-"),
    }));
    events.sort_by_key(RepairEvent::timestamp);
    events
}

/// Repair record for `unit`, or `None` when it did not complete the
/// repair path.
///
/// A unit qualifies when it reached every milestone state and never entered
/// a disqualifying one.
#[must_use]
pub fn repair_record(unit: &Unit, rules: &RepairConfig) -> Option<RepairRecord> {
    let reached = |state: &String| unit.status_history.iter().any(|change| &change.to == state);
    if !rules.milestones.iter().all(reached) || rules.disqualifying.iter().any(reached) {
        return None;
    }

    let events = event_stream(unit)
        .into_iter()
        .filter(|event| match event {
            RepairEvent::StatusChange { to, .. } => rules.milestones.contains(to),
            RepairEvent::Comment { body, .. } => !mentions_image(body, &rules.image_extensions),
        })
        .collect();

    Some(RepairRecord {
        key: unit.key.clone(),
        serial: unit.serial.clone(),
        board_model: unit
            .board_model
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        repair_summary: unit
            .repair_summary
            .as_deref()
            .map_or_else(|| NOT_AVAILABLE.to_string(), |summary| summary.replace('\n', "-")),
        events,
    })
}

/// Repair records for every qualifying primary unit of `batch`.
#[must_use]
pub fn repair_records(batch: &Batch, rules: &RepairConfig) -> Vec<RepairRecord> {
    batch
        .primary
        .iter()
        .filter_map(|unit| repair_record(unit, rules))
        .collect()
}

fn mentions_image(body: &str, extensions: &[String]) -> bool {
    let lower = body.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| lower.contains(&ext.to_ascii_lowercase()))
}

#[allow(clippy::ref_option)]
fn serialize_seconds<S: Serializer>(
    duration: &Option<TimeDelta>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    duration.map(|d| d.num_seconds()).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, StatusChange, UnitKind};
    use chrono::NaiveDate;

    fn at(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .expect("valid time")
    }

    fn change(to: &str, ts: NaiveDateTime) -> StatusChange {
        StatusChange {
            from: None,
            to: to.to_string(),
            timestamp: ts,
            author: "tech".to_string(),
        }
    }

    fn comment(body: &str, ts: NaiveDateTime) -> Comment {
        Comment {
            author: "tech".to_string(),
            timestamp: ts,
            body: body.to_string(),
        }
    }

    fn unit(history: Vec<StatusChange>, comments: Vec<Comment>) -> Unit {
        Unit {
            key: "RT-5".to_string(),
            serial: "HB-5".to_string(),
            kind: UnitKind::Hashboard,
            created: Some(at(1, 8)),
            assignee: None,
            board_model: Some("S19j Pro".to_string()),
            repair_summary: None,
            status_history: history,
            comments,
        }
    }

    #[test]
    fn stream_merges_and_measures_durations() {
        let u = unit(
            vec![
                change("Awaiting Functional Test", at(3, 9)),
                change("Advanced Repair", at(2, 9)),
            ],
            vec![comment("reflowed\nASIC 12", at(2, 12))],
        );
        let events = event_stream(&u);
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            RepairEvent::StatusChange { to, duration: Some(d), .. }
                if to == "Advanced Repair" && d.num_hours() == 24
        ));
        assert!(matches!(
            &events[1],
            RepairEvent::Comment { body, .. } if body == "reflowed-ASIC 12"
        ));
        assert!(matches!(
            &events[2],
            RepairEvent::StatusChange { duration: None, .. }
        ));
    }

    #[test]
    fn record_requires_every_milestone() {
        let u = unit(vec![change("Advanced Repair", at(2, 9))], Vec::new());
        assert!(repair_record(&u, &RepairConfig::default()).is_none());
    }

    #[test]
    fn disqualifying_state_excludes_unit() {
        let u = unit(
            vec![
                change("Advanced Repair", at(2, 9)),
                change("Awaiting Functional Test", at(3, 9)),
                change("Scrap", at(4, 9)),
            ],
            Vec::new(),
        );
        assert!(repair_record(&u, &RepairConfig::default()).is_none());
    }

    #[test]
    fn record_keeps_milestones_and_text_comments() {
        let u = unit(
            vec![
                change("Backlog", at(1, 9)),
                change("Advanced Repair", at(2, 9)),
                change("Awaiting Functional Test", at(3, 9)),
                change("Done", at(4, 9)),
            ],
            vec![
                comment("see board.JPG", at(2, 10)),
                comment("replaced regulator", at(2, 11)),
            ],
        );
        let record = repair_record(&u, &RepairConfig::default()).expect("qualifies");
        assert_eq!(record.board_model, "S19j Pro");
        assert_eq!(record.repair_summary, "N/A");
        let kinds: Vec<&str> = record
            .events
            .iter()
            .map(|event| match event {
                RepairEvent::StatusChange { to, .. } => to.as_str(),
                RepairEvent::Comment { body, .. } => body.as_str(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["Advanced Repair", "replaced regulator", "Awaiting Functional Test"]
        );
        // Awaiting Functional Test lasted until Done, which was filtered out.
        assert!(matches!(
            &record.events[2],
            RepairEvent::StatusChange { duration: Some(d), .. } if d.num_hours() == 24
        ));
    }

    #[test]
    fn repair_summary_is_flattened_to_one_line() {
        let mut u = unit(
            vec![
                change("Advanced Repair", at(2, 9)),
                change("Awaiting Functional Test", at(3, 9)),
            ],
            Vec::new(),
        );
        u.repair_summary = Some("reflow\nASIC 3".to_string());
        let record = repair_record(&u, &RepairConfig::default()).expect("qualifies");
        assert_eq!(record.repair_summary, "reflow-ASIC 3");
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let event = RepairEvent::StatusChange {
            timestamp: at(2, 9),
            author: "tech".to_string(),
            from: None,
            to: "Advanced Repair".to_string(),
            duration: Some(TimeDelta::hours(2)),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "status_change");
        assert_eq!(json["duration"], 7200);
    }
}
