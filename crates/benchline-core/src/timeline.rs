//! Per-unit day-state timelines.
//!
//! A unit's status history is a sparse list of timestamped transitions. The
//! builder materializes it into one slot per calendar day in two phases:
//!
//! 1. **Stamp**: every transition writes its `to` state into the slot for
//!    the day it landed on. Transitions are applied in ascending timestamp
//!    order, so the last transition of a day wins.
//! 2. **Forward-fill**: each empty slot inherits the nearest earlier
//!    non-empty slot. Slots before the first transition stay empty; no
//!    state is asserted before the first observed signal.

use chrono::NaiveDate;
use tracing::trace;

use crate::day::DayRange;
use crate::error::EngineError;
use crate::model::Unit;

/// Dense day → state assignment for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayTimeline {
    range: DayRange,
    states: Vec<Option<String>>,
}

impl DayTimeline {
    #[must_use]
    pub const fn range(&self) -> DayRange {
        self.range
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.range.start()
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.range.end()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State on `day`. `None` both outside the range and before the first
    /// transition.
    #[must_use]
    pub fn get(&self, day: NaiveDate) -> Option<&str> {
        let offset = self.range.offset_of(day)?;
        self.states.get(offset)?.as_deref()
    }

    /// State on `day`, carrying the last in-range state past the range end.
    ///
    /// Days before the range start resolve to `None`.
    #[must_use]
    pub fn resolve(&self, day: NaiveDate) -> Option<&str> {
        if day > self.range.end() {
            return self.states.last()?.as_deref();
        }
        self.get(day)
    }

    /// `(day, state)` pairs in ascending day order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<&str>)> + '_ {
        self.range.days().zip(self.states.iter().map(Option::as_deref))
    }

    /// First day carrying a state, i.e. the first observed transition day.
    #[must_use]
    pub fn first_observed(&self) -> Option<NaiveDate> {
        let offset = self.states.iter().position(Option::is_some)?;
        self.range.day_at(offset)
    }
}

/// Build the day-state timeline of `unit` over `[creation day, end]`.
///
/// When `end` precedes the creation day the timeline covers the creation
/// day alone. Transitions dated before the creation day are stamped onto the
/// creation day; transitions after `end` are ignored.
///
/// # Errors
///
/// Returns [`EngineError::MissingCreationDate`] when the unit has no usable
/// creation timestamp. Callers exclude such units from aggregation.
pub fn build_timeline(unit: &Unit, end: NaiveDate) -> Result<DayTimeline, EngineError> {
    let created = unit
        .created_day()
        .ok_or_else(|| EngineError::MissingCreationDate {
            unit: unit.key.clone(),
        })?;

    let range = DayRange::new(created, end);
    let mut states: Vec<Option<String>> = vec![None; range.len()];

    for change in unit.sorted_history() {
        let day = change.day().max(range.start());
        let Some(offset) = range.offset_of(day) else {
            trace!(unit = %unit.key, %day, "transition after timeline end ignored");
            continue;
        };
        states[offset] = Some(change.to.clone());
    }

    let mut carried: Option<String> = None;
    for slot in &mut states {
        if slot.is_some() {
            carried.clone_from(slot);
        } else {
            slot.clone_from(&carried);
        }
    }

    Ok(DayTimeline { range, states })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StatusChange, UnitKind};
    use chrono::NaiveDateTime;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).expect("valid date")
    }

    fn at(m: u32, day: u32, h: u32) -> NaiveDateTime {
        d(m, day).and_hms_opt(h, 0, 0).expect("valid time")
    }

    fn change(to: &str, ts: NaiveDateTime) -> StatusChange {
        StatusChange {
            from: None,
            to: to.to_string(),
            timestamp: ts,
            author: "tech".to_string(),
        }
    }

    fn unit(created: Option<NaiveDateTime>, history: Vec<StatusChange>) -> Unit {
        Unit {
            key: "RT-10".to_string(),
            serial: "HB-10".to_string(),
            kind: UnitKind::Hashboard,
            created,
            assignee: None,
            board_model: None,
            repair_summary: None,
            status_history: history,
            comments: Vec::new(),
        }
    }

    #[test]
    fn forward_fill_carries_last_state() {
        let u = unit(
            Some(at(1, 1, 8)),
            vec![
                change("Advanced Repair", at(1, 2, 9)),
                change("Awaiting Functional Test", at(1, 3, 9)),
                change("Done", at(1, 5, 9)),
            ],
        );
        let tl = build_timeline(&u, d(1, 5)).expect("timeline");
        let states: Vec<_> = tl.iter().map(|(_, s)| s).collect();
        assert_eq!(
            states,
            vec![
                None,
                Some("Advanced Repair"),
                Some("Awaiting Functional Test"),
                Some("Awaiting Functional Test"),
                Some("Done"),
            ]
        );
        assert_eq!(tl.first_observed(), Some(d(1, 2)));
    }

    #[test]
    fn same_day_last_write_wins_regardless_of_input_order() {
        let history = vec![
            change("Done", at(1, 2, 17)),
            change("Advanced Repair", at(1, 2, 9)),
        ];
        let u = unit(Some(at(1, 1, 8)), history);
        let tl = build_timeline(&u, d(1, 3)).expect("timeline");
        assert_eq!(tl.get(d(1, 2)), Some("Done"));
        assert_eq!(tl.get(d(1, 3)), Some("Done"));
    }

    #[test]
    fn end_before_creation_yields_single_day() {
        let u = unit(Some(at(1, 10, 8)), vec![change("Backlog", at(1, 10, 9))]);
        let tl = build_timeline(&u, d(1, 2)).expect("timeline");
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.start(), d(1, 10));
        assert_eq!(tl.get(d(1, 10)), Some("Backlog"));
    }

    #[test]
    fn missing_creation_date_is_an_error() {
        let u = unit(None, vec![change("Backlog", at(1, 1, 9))]);
        assert_eq!(
            build_timeline(&u, d(1, 5)),
            Err(EngineError::MissingCreationDate {
                unit: "RT-10".to_string()
            })
        );
    }

    #[test]
    fn transitions_outside_range_are_clamped_or_dropped() {
        let u = unit(
            Some(at(1, 3, 8)),
            vec![
                change("Backlog", at(1, 1, 9)),
                change("Done", at(1, 9, 9)),
            ],
        );
        let tl = build_timeline(&u, d(1, 5)).expect("timeline");
        assert_eq!(tl.get(d(1, 3)), Some("Backlog"));
        assert_eq!(tl.get(d(1, 5)), Some("Backlog"));
        assert_eq!(tl.get(d(1, 6)), None);
        assert_eq!(tl.resolve(d(1, 6)), Some("Backlog"));
        assert_eq!(tl.resolve(d(1, 2)), None);
    }

    #[test]
    fn no_history_stays_empty() {
        let u = unit(Some(at(1, 1, 8)), Vec::new());
        let tl = build_timeline(&u, d(1, 4)).expect("timeline");
        assert_eq!(tl.len(), 4);
        assert!(tl.iter().all(|(_, s)| s.is_none()));
        assert!(tl.first_observed().is_none());
    }
}
