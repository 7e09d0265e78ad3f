//! Boundary to the remote events API.

mod error;
mod traits;

pub use error::{ApiError, Result};
pub use traits::{EventsApi, EventsResponse};
