use thiserror::Error;

/// Errors reported by an events API implementation.
///
/// Kept `Clone` so one failure can resolve every handle waiting on the same
/// fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for events API calls.
pub type Result<T> = std::result::Result<T, ApiError>;
