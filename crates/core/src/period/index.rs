//! Conversions between calendar dates and the integer period line.
//!
//! Day and week math runs on plain day offsets. Months and quarters go
//! through chrono, with days beyond chrono's range pinned to its first or
//! last representable date. Dates are local calendar dates: no timezone is
//! applied anywhere in this module.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use super::types::{DateSpan, DayOffset, Interval, Period};
use super::PeriodError;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Weeks start on Monday. 1970-01-01 is a Thursday, so the week holding
/// the epoch begins three days earlier.
const WEEK_SHIFT: i64 = 3;

/// Returns the day offset of a date.
pub fn day_offset(date: NaiveDate) -> DayOffset {
    i64::from(date.num_days_from_ce()) - EPOCH_DAYS_FROM_CE
}

/// Returns the date of a day offset.
pub fn date_of(offset: DayOffset) -> Result<NaiveDate, PeriodError> {
    offset
        .checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(|days| i32::try_from(days).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or(PeriodError::OutOfRange(offset))
}

/// Number of whole `interval`s between the epoch and `date`.
pub fn index(date: NaiveDate, interval: Interval) -> i64 {
    index_of_day(day_offset(date), interval)
}

/// Index of the `interval` containing the given day.
pub fn index_of_day(day: DayOffset, interval: Interval) -> i64 {
    match interval {
        Interval::Day => day,
        Interval::Week => day.saturating_add(WEEK_SHIFT).div_euclid(7),
        Interval::Month => {
            let date = pinned_date(day);
            (i64::from(date.year()) - 1970) * 12 + i64::from(date.month0())
        }
        Interval::Quarter => {
            let date = pinned_date(day);
            (i64::from(date.year()) - 1970) * 4 + i64::from(date.month0() / 3)
        }
    }
}

/// First day of the interval with the given index.
fn first_day(interval: Interval, index: i64) -> DayOffset {
    match interval {
        Interval::Day => index,
        Interval::Week => index.saturating_mul(7).saturating_sub(WEEK_SHIFT),
        Interval::Month => month_start(index),
        Interval::Quarter => month_start(index.saturating_mul(3)),
    }
}

fn month_start(month_index: i64) -> DayOffset {
    let year = month_index.div_euclid(12).saturating_add(1970);
    let month = month_index.rem_euclid(12) as u32 + 1;
    let first = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, 1));
    match first {
        Some(date) => day_offset(date),
        None if month_index < 0 => day_offset(NaiveDate::MIN),
        None => day_offset(NaiveDate::MAX) + 1,
    }
}

/// Date of a day offset, pinned to chrono's representable range.
fn pinned_date(day: DayOffset) -> NaiveDate {
    let day = day.clamp(day_offset(NaiveDate::MIN), day_offset(NaiveDate::MAX));
    date_of(day).unwrap_or(NaiveDate::MIN)
}

/// Widens any period to the enclosing whole days.
pub fn to_days(period: &Period) -> Period {
    if period.is_day() {
        return *period;
    }
    Period {
        interval: Interval::Day,
        start: first_day(period.interval, period.start),
        end: first_day(period.interval, period.end + 1) - 1,
    }
}

/// Inclusive first and last date covered by a period.
pub fn bounds(period: &Period) -> Result<DateSpan, PeriodError> {
    let days = to_days(period);
    Ok(DateSpan {
        start: date_of(days.start)?,
        end: date_of(days.end)?,
    })
}

/// Shifts a period by `n` times its own length, preserving the length.
pub fn add(period: &Period, n: i64) -> Period {
    let shift = n * period.len();
    Period {
        interval: period.interval,
        start: period.start + shift,
        end: period.end + shift,
    }
}

/// Smallest period of `interval` covering the given period.
pub fn convert(period: &Period, interval: Interval) -> Period {
    let days = to_days(period);
    Period {
        interval,
        start: index_of_day(days.start, interval),
        end: index_of_day(days.end, interval),
    }
}

/// The single `interval` containing the first day of the period.
pub fn anchor(period: &Period, interval: Interval) -> Period {
    let days = to_days(period);
    Period::single(interval, index_of_day(days.start, interval))
}

/// Guesses the coarsest interval whose boundaries both dates sit on.
///
/// Falls back to a day period when no coarser interval aligns exactly.
pub fn guess_interval(start: NaiveDate, end: NaiveDate) -> Period {
    let days = Period::days(day_offset(start), day_offset(end));
    for interval in Interval::COARSEST_FIRST {
        let candidate = convert(&days, interval);
        if to_days(&candidate) == days {
            return candidate;
        }
    }
    days
}

/// Day period spanned by an event running from `start` to `end`.
///
/// An end exactly at midnight does not cover the day it lands on, so an
/// event from Monday 09:00 to Tuesday 00:00 only touches Monday.
pub fn from_dates(start: NaiveDateTime, end: NaiveDateTime) -> Period {
    let first = day_offset(start.date());
    let mut last = day_offset(end.date());
    if end > start && end.date().and_hms_opt(0, 0, 0) == Some(end) {
        last -= 1;
    }
    Period::days(first, last.max(first))
}
