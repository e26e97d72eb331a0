//! Leading-noise pruning.
//!
//! A batch sometimes carries a stray unit created long before the bulk of
//! the order (a replacement board filed early). Left alone it stretches the
//! visible timeline across weeks of near-empty days. Pruning drops those
//! leading days and cuts the table off once the batch is fully closed.
//!
//! # Boundaries
//!
//! - **Start**: the first day whose own or next day's "Total Boards" count
//!   reaches `min_units`.
//! - **Stop**: the first day on which the terminal cohort is non-empty and
//!   covers every unit counted in "Total Boards". That day is *excluded*,
//!   unless it is the start day itself: a batch that closes on the day it
//!   starts keeps that one day.
//! - **Fallback**: no day reaches `min_units` → the whole table.
//!
//! Every retained row lists every label of the input table; a cohort absent
//! on that day is `None` so consumers can rely on a fixed schema.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

use crate::aggregate::{AggregateTable, TOTAL_BOARDS};
use crate::config::ProjectConfig;
use crate::model::UnitRef;

/// Cohort label → members, `None` where the cohort is absent that day.
pub type CohortRow = BTreeMap<String, Option<Vec<UnitRef>>>;

/// Pruning parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunePolicy {
    /// When false the full table is emitted.
    pub enabled: bool,
    pub min_units: usize,
    /// Cohort whose full coverage marks the batch as finished.
    pub terminal_label: String,
}

impl PrunePolicy {
    #[must_use]
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            enabled: config.prune.enabled,
            min_units: config.prune.min_units,
            terminal_label: config.states.terminal_label.clone(),
        }
    }
}

/// A pruned, fixed-schema day table ready for serialization.
///
/// Days serialize as `YYYY-MM-DD` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortTable {
    /// Column order for every row.
    pub labels: Vec<String>,
    pub days: BTreeMap<NaiveDate, CohortRow>,
}

impl CohortTable {
    #[must_use]
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    #[must_use]
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Size of `label`'s cohort on `day`; zero when absent.
    #[must_use]
    pub fn cohort_len(&self, day: NaiveDate, label: &str) -> usize {
        self.days
            .get(&day)
            .and_then(|row| row.get(label))
            .and_then(Option::as_ref)
            .map_or(0, Vec::len)
    }

    fn from_rows(table: &AggregateTable, offsets: Range<usize>) -> Self {
        let labels = table.labels().as_slice().to_vec();
        let mut days = BTreeMap::new();
        for offset in offsets {
            let (Some(day), Some(row)) = (table.range().day_at(offset), table.row_at(offset)) else {
                continue;
            };
            let complete: CohortRow = labels
                .iter()
                .map(|label| (label.clone(), row.get(label).cloned()))
                .collect();
            days.insert(day, complete);
        }
        Self { labels, days }
    }
}

/// Trim leading noise and trailing closed days from `table`.
#[must_use]
pub fn prune(table: &AggregateTable, policy: &PrunePolicy) -> CohortTable {
    let len = table.len();
    if !policy.enabled {
        return CohortTable::from_rows(table, 0..len);
    }

    let boards = |offset: usize| table.cohort_len_at(offset, TOTAL_BOARDS);

    let start = (0..len).find(|&offset| {
        boards(offset) >= policy.min_units
            || (offset + 1 < len && boards(offset + 1) >= policy.min_units)
    });
    let Some(start) = start else {
        debug!(
            days = len,
            min_units = policy.min_units,
            "no day reaches the unit threshold; keeping full table"
        );
        return CohortTable::from_rows(table, 0..len);
    };

    let stop = (start..len)
        .find(|&offset| {
            let closed = table.cohort_len_at(offset, &policy.terminal_label);
            closed > 0 && closed == boards(offset)
        })
        .map_or(len, |stop| stop.max(start + 1));

    debug!(
        dropped_leading = start,
        dropped_trailing = len - stop,
        kept = stop - start,
        "pruned batch timeline"
    );
    CohortTable::from_rows(table, start..stop)
}
