//! HTTP client for the events API.

pub mod events;

use daywise_core::event::CalendarGroupId;

use crate::error::{ClientError, Result};

/// HTTP client for the events API.
#[derive(Debug, Clone)]
pub struct HttpEventsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventsClient {
    /// Create a new client with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Path prefix of a calendar group's endpoints.
    fn group_path(&self, group: &CalendarGroupId) -> Result<String> {
        if group.as_str().trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "calendar group id is empty".to_string(),
            ));
        }
        Ok(format!(
            "/api/calendar-groups/{}",
            urlencoding::encode(group.as_str())
        ))
    }

    /// Handle error responses.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(ClientError::from)
        } else {
            Err(error_from(response).await)
        }
    }

    /// Handle responses without a body.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}

async fn error_from(response: reqwest::Response) -> ClientError {
    let status = response.status();
    if status.as_u16() == 404 {
        return ClientError::NotFound {
            resource: response.url().path().to_string(),
        };
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ClientError::ServerError {
        status: status.as_u16(),
        message,
    }
}
