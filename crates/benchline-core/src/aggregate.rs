//! Batch-wide cohort aggregation.
//!
//! Runs the per-unit timeline builder over every unit of a batch and folds
//! the results into one row of cohort lists per calendar day.
//!
//! # Row contents
//!
//! - **Total Boards**: every primary unit that exists on that day (on or
//!   after its creation day), whatever its state.
//! - **Total Chassis**: every secondary unit, on every day of the range.
//! - **Total Processed**: primary units whose raw state is a processed
//!   state (see [`StateConfig::processed_labels`]).
//! - **State cohorts**: primary units under their relabeled state, and
//!   secondary units under their mapped cohort when their state is tracked.
//!
//! The three totals are present on every row even when empty. State cohorts
//! appear only on rows where at least one unit holds that state, but the
//! label is registered in [`CohortLabels`] from then on.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::StateConfig;
use crate::day::DayRange;
use crate::error::EngineError;
use crate::model::{Batch, Unit, UnitKind, UnitRef};
use crate::timeline::{DayTimeline, build_timeline};

pub const TOTAL_BOARDS: &str = "Total Boards";
pub const TOTAL_CHASSIS: &str = "Total Chassis";
pub const TOTAL_PROCESSED: &str = "Total Processed";

/// Cohorts present on every row of an aggregate table.
pub const TOTAL_COHORTS: [&str; 3] = [TOTAL_BOARDS, TOTAL_CHASSIS, TOTAL_PROCESSED];

/// Cohort label → members for one day.
pub type DayCohorts = BTreeMap<String, Vec<UnitRef>>;

/// Cohort labels in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CohortLabels {
    labels: Vec<String>,
}

impl CohortLabels {
    /// A label set seeded with the three totals.
    #[must_use]
    pub fn with_totals() -> Self {
        let mut labels = Self::default();
        for label in TOTAL_COHORTS {
            labels.register(label);
        }
        labels
    }

    /// Add `label` if unseen. Returns true when it was new.
    pub fn register(&mut self, label: &str) -> bool {
        if self.contains(label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|known| known == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

/// One row of cohort lists per day of a [`DayRange`], indexed by day offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTable {
    range: DayRange,
    labels: CohortLabels,
    rows: Vec<DayCohorts>,
}

impl AggregateTable {
    /// An empty table over `range` with the totals present on every row.
    #[must_use]
    pub fn new(range: DayRange, labels: CohortLabels) -> Self {
        let empty_row: DayCohorts = TOTAL_COHORTS
            .iter()
            .map(|label| ((*label).to_string(), Vec::new()))
            .collect();
        Self {
            range,
            labels,
            rows: vec![empty_row; range.len()],
        }
    }

    #[must_use]
    pub const fn range(&self) -> DayRange {
        self.range
    }

    #[must_use]
    pub const fn labels(&self) -> &CohortLabels {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for `day`, if it is inside the range.
    #[must_use]
    pub fn row(&self, day: NaiveDate) -> Option<&DayCohorts> {
        self.rows.get(self.range.offset_of(day)?)
    }

    /// Row at day `offset` from the range start.
    #[must_use]
    pub fn row_at(&self, offset: usize) -> Option<&DayCohorts> {
        self.rows.get(offset)
    }

    /// `(day, row)` pairs in ascending day order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &DayCohorts)> + '_ {
        self.range.days().zip(self.rows.iter())
    }

    /// Size of `label`'s cohort at `offset`; zero when absent.
    #[must_use]
    pub fn cohort_len_at(&self, offset: usize, label: &str) -> usize {
        self.rows
            .get(offset)
            .and_then(|row| row.get(label))
            .map_or(0, Vec::len)
    }

    /// Size of `label`'s cohort on `day`; zero when absent.
    #[must_use]
    pub fn cohort_len(&self, day: NaiveDate, label: &str) -> usize {
        self.range
            .offset_of(day)
            .map_or(0, |offset| self.cohort_len_at(offset, label))
    }

    fn push(&mut self, offset: usize, label: &str, member: UnitRef) {
        self.labels.register(label);
        if let Some(row) = self.rows.get_mut(offset) {
            row.entry(label.to_string()).or_default().push(member);
        }
    }
}

/// Aggregator output: the table plus the units left out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub table: AggregateTable,
    /// Units excluded for lacking a creation date, in batch order.
    pub skipped: Vec<EngineError>,
    /// Primary units that made it into the table.
    pub primary_included: usize,
    /// Secondary units that made it into the table.
    pub secondary_included: usize,
}

/// Day range a batch aggregates over.
///
/// Starts at the batch anchor. Ends at the latest transition day of any
/// usable unit; when no unit has transitions, at the latest creation day.
/// An end before the anchor collapses to the anchor.
///
/// # Errors
///
/// Returns [`EngineError::NoBatchData`] when no unit has a usable creation
/// date.
pub fn batch_range(batch: &Batch) -> Result<DayRange, EngineError> {
    let usable: Vec<&Unit> = batch.units().filter(|unit| unit.created.is_some()).collect();
    if usable.is_empty() {
        return Err(EngineError::NoBatchData {
            batch: batch.key.clone(),
        });
    }

    let last_transition = usable
        .iter()
        .flat_map(|unit| unit.status_history.iter())
        .map(crate::model::StatusChange::day)
        .max();
    let end = last_transition
        .or_else(|| usable.iter().filter_map(|unit| unit.created_day()).max())
        .unwrap_or(batch.anchor);

    Ok(DayRange::new(batch.anchor, end))
}

/// Aggregate every unit of `batch` into a day table.
///
/// `known_labels` seeds the label set after the totals, so cohorts a caller
/// already knows about keep a stable position even when empty.
///
/// # Errors
///
/// Returns [`EngineError::NoBatchData`] when the batch has no unit with a
/// usable creation date. Individual units without one are skipped and
/// reported in [`Aggregation::skipped`].
pub fn aggregate(
    batch: &Batch,
    rules: &StateConfig,
    known_labels: &[String],
) -> Result<Aggregation, EngineError> {
    let range = batch_range(batch)?;

    let mut labels = CohortLabels::with_totals();
    for label in known_labels {
        labels.register(label);
    }
    let mut table = AggregateTable::new(range, labels);
    let mut skipped = Vec::new();
    let mut primary_included = 0;
    let mut secondary_included = 0;

    for unit in batch.units() {
        let timeline = match build_timeline(unit, range.end()) {
            Ok(timeline) => timeline,
            Err(err) => {
                warn!(batch = %batch.key, unit = %unit.key, "{err}; unit excluded");
                skipped.push(err);
                continue;
            }
        };

        match unit.kind {
            UnitKind::Hashboard => {
                insert_primary(&mut table, unit, &timeline, rules);
                primary_included += 1;
            }
            UnitKind::Chassis => {
                insert_secondary(&mut table, unit, &timeline, rules);
                secondary_included += 1;
            }
        }
    }

    debug!(
        batch = %batch.key,
        start = %range.start(),
        end = %range.end(),
        days = range.len(),
        primary = primary_included,
        secondary = secondary_included,
        skipped = skipped.len(),
        labels = table.labels().len(),
        "aggregated batch timeline"
    );

    Ok(Aggregation {
        table,
        skipped,
        primary_included,
        secondary_included,
    })
}

fn insert_primary(table: &mut AggregateTable, unit: &Unit, timeline: &DayTimeline, rules: &StateConfig) {
    let range = table.range();
    let member = unit.to_ref();

    for (offset, day) in range.days().enumerate() {
        if day < timeline.start() {
            continue;
        }

        table.push(offset, TOTAL_BOARDS, member.clone());

        let Some(raw) = timeline.resolve(day).or(rules.floor_state.as_deref()) else {
            continue;
        };
        if rules.is_processed(raw) {
            table.push(offset, TOTAL_PROCESSED, member.clone());
        }
        table.push(offset, rules.canonical(raw), member.clone());
    }
}

fn insert_secondary(
    table: &mut AggregateTable,
    unit: &Unit,
    timeline: &DayTimeline,
    rules: &StateConfig,
) {
    let range = table.range();
    let member = unit.to_ref();

    for (offset, day) in range.days().enumerate() {
        table.push(offset, TOTAL_CHASSIS, member.clone());

        if let Some(label) = timeline.resolve(day).and_then(|raw| rules.secondary_cohort(raw)) {
            table.push(offset, label, member.clone());
        }
    }
}
