//! Budget periods and calendar-month arithmetic.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive date range covered by a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// First day of the period.
    pub start: NaiveDate,
    /// Last day of the period (inclusive).
    pub end: NaiveDate,
}

/// The part of a period that falls inside one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSlice {
    /// First day of the calendar month.
    pub month: NaiveDate,
    /// First day of the month inside the period.
    pub start: NaiveDate,
    /// Last day of the month inside the period.
    pub end: NaiveDate,
    /// Number of period days in this month.
    pub days: i64,
}

impl Period {
    /// Creates a period without validating its bounds.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns true if the end date is strictly after the start date.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if `other` lies entirely within this period.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Returns true if the two periods share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Number of days in the period, both ends included.
    #[must_use]
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Partitions the period into calendar months, in date order.
    #[must_use]
    pub fn month_slices(&self) -> Vec<MonthSlice> {
        let mut slices = Vec::new();
        let mut cursor = self.start;

        while cursor <= self.end {
            let slice_end = last_of_month(cursor).min(self.end);
            slices.push(MonthSlice {
                month: first_of_month(cursor),
                start: cursor,
                end: slice_end,
                days: (slice_end - cursor).num_days() + 1,
            });
            cursor = slice_end + Days::new(1);
        }

        slices
    }
}

/// First day of the month containing `date`.
#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Last day of the month containing `date`.
#[must_use]
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date) + Months::new(1) - Days::new(1)
}
