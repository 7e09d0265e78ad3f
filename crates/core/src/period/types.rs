use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PeriodError;

/// Integer index of a day since 1970-01-01 (day 0).
pub type DayOffset = i64;

/// Calendar granularity of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    Month,
    Quarter,
}

impl Interval {
    /// Intervals ordered from the coarsest boundary alignment to the finest.
    pub const COARSEST_FIRST: [Interval; 4] = [
        Interval::Quarter,
        Interval::Month,
        Interval::Week,
        Interval::Day,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Quarter => "quarter",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            "quarter" => Ok(Interval::Quarter),
            other => Err(PeriodError::UnknownInterval(other.to_string())),
        }
    }
}

/// A span of whole intervals, `start..=end`, indexed since the epoch.
///
/// Index 0 of every interval is the one containing 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub interval: Interval,
    pub start: i64,
    pub end: i64,
}

impl Period {
    /// Creates a new period, validating that start <= end.
    pub fn new(interval: Interval, start: i64, end: i64) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::InvalidRange { start, end });
        }
        Ok(Self {
            interval,
            start,
            end,
        })
    }

    /// Creates a day period, swapping the bounds if they are reversed.
    pub fn days(start: DayOffset, end: DayOffset) -> Self {
        Self {
            interval: Interval::Day,
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Creates a period covering exactly one interval.
    pub fn single(interval: Interval, index: i64) -> Self {
        Self {
            interval,
            start: index,
            end: index,
        }
    }

    /// Number of intervals covered.
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    /// Always false for a well-formed period; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn is_day(&self) -> bool {
        self.interval == Interval::Day
    }

    /// Returns true if `index` lies inside this period.
    pub fn contains(&self, index: i64) -> bool {
        self.start <= index && index <= self.end
    }

    /// Overlap of two periods of the same interval.
    pub fn intersect(&self, other: &Period) -> Option<Period> {
        if self.interval != other.interval {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Period {
            interval: self.interval,
            start,
            end,
        })
    }

    /// Returns true if two periods of the same interval share at least one index.
    pub fn overlaps(&self, other: &Period) -> bool {
        self.intersect(other).is_some()
    }

    /// Iterates the interval indices covered by this period.
    pub fn indices(&self) -> RangeInclusive<i64> {
        self.start..=self.end
    }

    /// Clamps a day period to at most `max_days` days from its start.
    ///
    /// Used by views that load a window of days and grow it on demand.
    /// Non-day periods are returned unchanged.
    pub fn with_day_limit(self, max_days: usize) -> Period {
        if !self.is_day() || max_days == 0 {
            return self;
        }
        let limit = i64::try_from(max_days).unwrap_or(i64::MAX);
        Period {
            end: self.end.min(self.start.saturating_add(limit - 1)),
            ..self
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.interval, self.start, self.end)
    }
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
