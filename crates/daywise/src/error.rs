use daywise_core::api::ApiError;
use daywise_core::event::{CalendarGroupId, EventId};
use daywise_core::period::PeriodError;
use thiserror::Error;

/// Errors resolved through store handles.
///
/// `Clone` so one shared fetch can resolve every handle attached to it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("Invalid period: {0}")]
    Period(#[from] PeriodError),

    #[error("Event not found: {0}")]
    NotFound(EventId),

    #[error("Events for {group} are not loaded")]
    NotReady { group: CalendarGroupId },

    #[error("Request was dropped before it completed")]
    Dropped,

    #[error("Worker channel closed")]
    WorkerUnavailable,
}

pub type Result<T> = std::result::Result<T, StoreError>;
