use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Inclusive calendar range used for per-day API pulls and batch snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        DateRange { start: day, end: day }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, counting both ends. Zero when inverted.
    pub fn num_days(self) -> u32 {
        if self.end < self.start {
            return 0;
        }
        (self.end - self.start).num_days() as u32 + 1
    }

    /// Rejects inverted ranges and ranges longer than `max_days`.
    pub fn validate(self, max_days: u32) -> Result<Self, CoreError> {
        if self.start > self.end {
            return Err(CoreError::InvertedRange(self.start, self.end));
        }
        let days = self.num_days();
        if days > max_days {
            return Err(CoreError::RangeTooLong { days, max: max_days });
        }
        Ok(self)
    }

    pub fn days(self) -> DayIter {
        DayIter { next: Some(self.start), end: self.end }
    }
}

/// Iterator over each date of a [`DateRange`], in ascending order.
#[derive(Debug, Clone)]
pub struct DayIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next.filter(|d| *d <= self.end)?;
        self.next = current.checked_add_days(Days::new(1));
        Some(current)
    }
}
