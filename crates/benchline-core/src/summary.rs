//! Batch-level summaries derived from the pruned day table.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::config::ProjectConfig;
use crate::day::business_days;
use crate::error::{EngineError, ErrorCode};
use crate::model::Batch;
use crate::prune::{CohortTable, PrunePolicy, prune};

/// Whether every primary unit has reached the terminal state.
///
/// Serializes as `true`, `false`, or `null` for a batch without units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedState {
    Open,
    Closed,
    Undetermined,
}

impl ClosedState {
    #[must_use]
    pub const fn as_option(self) -> Option<bool> {
        match self {
            Self::Open => Some(false),
            Self::Closed => Some(true),
            Self::Undetermined => None,
        }
    }
}

impl Serialize for ClosedState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

/// Compare the primary-unit count with the number of units whose last
/// transition landed on `terminal_label`.
#[must_use]
pub fn closed_state(batch: &Batch, terminal_label: &str) -> ClosedState {
    let total = batch.primary.len();
    if total == 0 {
        return ClosedState::Undetermined;
    }
    let finished = batch
        .primary
        .iter()
        .filter(|unit| {
            unit.last_transition()
                .is_some_and(|change| change.to == terminal_label)
        })
        .count();
    if finished == total {
        ClosedState::Closed
    } else {
        ClosedState::Open
    }
}

/// Earliest day kept after pruning.
#[must_use]
pub fn first_activity_day(table: &CohortTable) -> Option<NaiveDate> {
    table.first_day()
}

/// Latest transition across all primary units, ignoring pruning.
#[must_use]
pub fn last_activity(batch: &Batch) -> Option<NaiveDateTime> {
    batch
        .primary
        .iter()
        .flat_map(|unit| unit.status_history.iter())
        .map(|change| change.timestamp)
        .max()
}

/// Units per business day; zero when no business day elapsed.
#[must_use]
pub fn process_rate(unit_count: usize, business_day_count: u32) -> f64 {
    if business_day_count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let units = unit_count as f64;
    units / f64::from(business_day_count)
}

/// Outcome cohort sizes on the most recent day that accounts for every unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalCounts {
    /// Day the counts were read from.
    pub day: Option<NaiveDate>,
    pub counts: BTreeMap<String, usize>,
    /// Units missing from the outcome cohorts on `day`; zero when balanced.
    pub unaccounted: usize,
    /// Set when no day balanced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `E3003` alongside `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl TerminalCounts {
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.error.is_none()
    }
}

/// Scan `table` from the newest day back for the first day on which the
/// `outcome_labels` cohorts together hold exactly `unit_count` units.
///
/// Reclassification lag often leaves the newest day one unit short, so the
/// scan walks backward rather than reading the last day. When no day
/// balances, the newest day's counts are returned with an error annotation.
#[must_use]
pub fn terminal_cohort_counts(
    table: &CohortTable,
    outcome_labels: &[String],
    unit_count: usize,
) -> TerminalCounts {
    let counts_on = |day: NaiveDate| -> BTreeMap<String, usize> {
        outcome_labels
            .iter()
            .map(|label| (label.clone(), table.cohort_len(day, label)))
            .collect()
    };

    for &day in table.days.keys().rev() {
        let counts = counts_on(day);
        if counts.values().sum::<usize>() == unit_count {
            return TerminalCounts {
                day: Some(day),
                counts,
                unaccounted: 0,
                error: None,
                error_code: None,
            };
        }
    }

    let day = table.last_day();
    let counts = day.map(counts_on).unwrap_or_else(|| {
        outcome_labels
            .iter()
            .map(|label| (label.clone(), 0))
            .collect()
    });
    let accounted: usize = counts.values().sum();
    let unaccounted = unit_count.saturating_sub(accounted);
    let error = format!(
        "cohort accounting mismatch: {unaccounted} of {unit_count} units unaccounted for"
    );
    warn!(?day, unaccounted, unit_count, "terminal cohorts never balance");

    TerminalCounts {
        day,
        counts,
        unaccounted,
        error: Some(error),
        error_code: Some(ErrorCode::CohortAccountingMismatch.code()),
    }
}

/// Summary record for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub key: String,
    pub title: String,
    pub anchor_date: NaiveDate,
    pub unit_count: usize,
    pub secondary_unit_count: usize,
    pub closed_state: ClosedState,
    pub terminal_cohort_counts: TerminalCounts,
    pub first_activity_date: Option<NaiveDate>,
    pub last_activity_date: Option<NaiveDate>,
    pub business_day_count: u32,
    pub process_rate: f64,
}

/// Everything the engine derives for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnalysis {
    pub summary: BatchSummary,
    pub timeline: CohortTable,
    /// Keys of units excluded for lacking a creation date.
    pub skipped_units: Vec<String>,
}

/// Run the full pipeline for `batch`: aggregate, prune, summarize.
///
/// # Errors
///
/// Returns [`EngineError::NoBatchData`] when the batch has no resolvable
/// day range. Callers should record the batch as excluded.
pub fn analyze(
    batch: &Batch,
    config: &ProjectConfig,
    known_labels: &[String],
) -> Result<BatchAnalysis, EngineError> {
    let aggregation = aggregate(batch, &config.states, known_labels)?;
    let timeline = prune(&aggregation.table, &PrunePolicy::from_config(config));

    let first = first_activity_day(&timeline);
    let last = last_activity(batch).map(|ts| ts.date());
    let business_day_count = match (first, last) {
        (Some(first), Some(last)) => business_days(first, last, &config.calendar.holidays),
        _ => 0,
    };
    let unit_count = batch.primary.len();

    let summary = BatchSummary {
        key: batch.key.clone(),
        title: batch.title.clone(),
        anchor_date: batch.anchor,
        unit_count,
        secondary_unit_count: batch.secondary.len(),
        closed_state: closed_state(batch, &config.states.terminal_label),
        terminal_cohort_counts: terminal_cohort_counts(
            &timeline,
            &config.states.outcome_labels,
            aggregation.primary_included,
        ),
        first_activity_date: first,
        last_activity_date: last,
        business_day_count,
        process_rate: process_rate(unit_count, business_day_count),
    };

    debug!(
        batch = %batch.key,
        closed = ?summary.closed_state,
        days = timeline.len(),
        business_days = business_day_count,
        "summarized batch"
    );

    let skipped_units = aggregation
        .skipped
        .iter()
        .filter_map(|err| match err {
            EngineError::MissingCreationDate { unit } => Some(unit.clone()),
            EngineError::NoBatchData { .. } => None,
        })
        .collect();

    Ok(BatchAnalysis {
        summary,
        timeline,
        skipped_units,
    })
}

/// Summary record only; see [`analyze`].
///
/// # Errors
///
/// Returns [`EngineError::NoBatchData`] when the batch has no resolvable
/// day range.
pub fn summarize(batch: &Batch, config: &ProjectConfig) -> Result<BatchSummary, EngineError> {
    analyze(batch, config, &[]).map(|analysis| analysis.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StatusChange, Unit, UnitKind};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).expect("valid date")
    }

    fn at(m: u32, day: u32) -> NaiveDateTime {
        d(m, day).and_hms_opt(9, 0, 0).expect("valid time")
    }

    fn board(key: &str, moves: &[(&str, NaiveDateTime)]) -> Unit {
        Unit {
            key: key.to_string(),
            serial: key.to_string(),
            kind: UnitKind::Hashboard,
            created: Some(at(1, 1)),
            assignee: None,
            board_model: None,
            repair_summary: None,
            status_history: moves
                .iter()
                .map(|(to, ts)| StatusChange {
                    from: None,
                    to: (*to).to_string(),
                    timestamp: *ts,
                    author: "tech".to_string(),
                })
                .collect(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn closed_state_uses_last_transition() {
        let batch = Batch::new("RT-1", "Order", d(1, 1)).with_units([
            board("a", &[("Done", at(1, 2))]),
            board("b", &[("Done", at(1, 2)), ("Advanced Repair", at(1, 3))]),
        ]);
        assert_eq!(closed_state(&batch, "Done"), ClosedState::Open);

        let batch = Batch::new("RT-1", "Order", d(1, 1)).with_units([
            board("a", &[("Done", at(1, 2))]),
            board("b", &[("Advanced Repair", at(1, 3)), ("Done", at(1, 4))]),
        ]);
        assert_eq!(closed_state(&batch, "Done"), ClosedState::Closed);
    }

    #[test]
    fn closed_state_without_units_is_undetermined() {
        let batch = Batch::new("RT-1", "Order", d(1, 1));
        assert_eq!(closed_state(&batch, "Done"), ClosedState::Undetermined);
        assert_eq!(
            serde_json::to_value(ClosedState::Undetermined).expect("serialize"),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_value(ClosedState::Closed).expect("serialize"),
            serde_json::Value::Bool(true)
        );
    }

    #[test]
    fn process_rate_handles_zero_days() {
        assert!(process_rate(12, 0).abs() < f64::EPSILON);
        assert!((process_rate(12, 4) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn terminal_counts_walk_back_to_balanced_day() {
        let outcomes = vec!["Done".to_string(), "Awaiting Functional Test".to_string()];
        // a done on 01-03; b moves through a state outside the outcome set.
        let batch = Batch::new("RT-1", "Order", d(1, 1)).with_units([
            board("a", &[("Awaiting Functional Test", at(1, 2)), ("Done", at(1, 3))]),
            board("b", &[("Awaiting Functional Test", at(1, 2)), ("Rework", at(1, 3))]),
        ]);
        let agg = aggregate(&batch, &crate::config::StateConfig::default(), &[]).expect("aggregate");
        let table = prune(
            &agg.table,
            &PrunePolicy {
                enabled: false,
                min_units: 1,
                terminal_label: "Done".to_string(),
            },
        );
        let counts = terminal_cohort_counts(&table, &outcomes, 2);
        assert!(counts.is_balanced());
        assert_eq!(counts.day, Some(d(1, 2)));
        assert_eq!(counts.counts["Awaiting Functional Test"], 2);
        assert_eq!(counts.counts["Done"], 0);
        assert!(counts.error_code.is_none());
    }

    #[test]
    fn terminal_counts_annotate_mismatch() {
        let outcomes = vec!["Done".to_string()];
        let batch = Batch::new("RT-1", "Order", d(1, 1)).with_units([
            board("a", &[("Done", at(1, 2))]),
            board("b", &[("Rework", at(1, 2))]),
        ]);
        let agg = aggregate(&batch, &crate::config::StateConfig::default(), &[]).expect("aggregate");
        let table = prune(
            &agg.table,
            &PrunePolicy {
                enabled: false,
                min_units: 1,
                terminal_label: "Done".to_string(),
            },
        );
        let counts = terminal_cohort_counts(&table, &outcomes, 2);
        assert!(!counts.is_balanced());
        assert_eq!(counts.day, Some(d(1, 2)));
        assert_eq!(counts.unaccounted, 1);
        assert!(counts.error.as_deref().is_some_and(|e| e.contains("1 of 2")));
        assert_eq!(counts.error_code, Some("E3003"));
        let json = serde_json::to_value(&counts).expect("serialize");
        assert_eq!(json["error_code"], "E3003");
    }

    #[test]
    fn analyze_rejects_empty_batch() {
        let batch = Batch::new("RT-7", "Empty", d(1, 1));
        let err = analyze(&batch, &ProjectConfig::default(), &[]).expect_err("no data");
        assert_eq!(
            err,
            EngineError::NoBatchData {
                batch: "RT-7".to_string()
            }
        );
    }
}
