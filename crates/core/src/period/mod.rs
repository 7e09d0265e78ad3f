mod error;
mod index;
mod types;

pub use error::PeriodError;
pub use index::{
    add, anchor, bounds, convert, date_of, day_offset, from_dates, guess_interval, index,
    index_of_day, to_days,
};
pub use types::{DateSpan, DayOffset, Interval, Period};
