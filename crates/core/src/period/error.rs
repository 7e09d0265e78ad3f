use thiserror::Error;

/// Errors that can occur when building or converting periods.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid period: start {start} must be before or equal to end {end}")]
    InvalidRange { start: i64, end: i64 },
    #[error("Day offset {0} is outside the supported calendar range")]
    OutOfRange(i64),
    #[error("Unknown interval: {0}")]
    UnknownInterval(String),
}
