//! Inclusive calendar-day ranges indexed by day offset.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// An inclusive `[start, end]` span of calendar days.
///
/// `end` is never before `start`; constructors clamp it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DayRange {
    /// Build a range, collapsing to the single day `start` when `end < start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    #[must_use]
    pub const fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from((self.end - self.start).num_days()).unwrap_or(0) + 1
    }

    /// Ranges are never empty; provided for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Offset of `day` from the range start, if it lies inside the range.
    #[must_use]
    pub fn offset_of(&self, day: NaiveDate) -> Option<usize> {
        if !self.contains(day) {
            return None;
        }
        usize::try_from((day - self.start).num_days()).ok()
    }

    /// The day at `offset`, if it lies inside the range.
    #[must_use]
    pub fn day_at(&self, offset: usize) -> Option<NaiveDate> {
        let offset = u64::try_from(offset).ok()?;
        let day = self.start.checked_add_days(Days::new(offset))?;
        self.contains(day).then_some(day)
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.len())
    }
}

/// Count weekdays in `[first, last]` that are not holidays.
///
/// Returns zero when `last < first`.
#[must_use]
pub fn business_days(first: NaiveDate, last: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> u32 {
    if last < first {
        return 0;
    }
    let count = DayRange::new(first, last)
        .days()
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|day| !holidays.contains(day))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
