//! Per-group request queueing and in-flight fetch tracking.

mod in_flight;
mod request;

pub use in_flight::{InFlight, InFlightIndex};
pub use request::{FetchRequest, PendingRequest, Queued, RequestQueue};
