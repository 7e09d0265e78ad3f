//! Client error types.

use daywise_core::api::ApiError;
use thiserror::Error;

/// Result type alias for client module.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::ServerError { status, message } => ApiError::Status { status, message },
            ClientError::NotFound { resource } => ApiError::Status {
                status: 404,
                message: format!("{resource} not found"),
            },
            ClientError::Request(error) if error.is_decode() => ApiError::Decode(error.to_string()),
            ClientError::Request(error) => ApiError::Transport(error.to_string()),
            ClientError::InvalidResponse(message) => ApiError::Decode(message),
            ClientError::Json(error) => ApiError::Decode(error.to_string()),
            ClientError::InvalidInput(message) => ApiError::InvalidRequest(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_maps_to_status() {
        let error = ClientError::ServerError {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(error.to_string(), "Server returned 502: bad gateway");
        assert_eq!(
            ApiError::from(error),
            ApiError::Status {
                status: 502,
                message: "bad gateway".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_request() {
        let error = ClientError::InvalidInput("empty group".to_string());
        assert_eq!(
            ApiError::from(error),
            ApiError::InvalidRequest("empty group".to_string())
        );
    }
}
