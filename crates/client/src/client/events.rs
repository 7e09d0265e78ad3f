//! Events API operations.

use async_trait::async_trait;
use daywise_core::api::{self, ApiError, EventsApi, EventsResponse};
use daywise_core::event::{CalendarGroupId, EventEntity, EventId, LabelPush};
use daywise_core::query::WireRequest;

use super::HttpEventsClient;
use crate::error::{ClientError, Result};

impl HttpEventsClient {
    /// Run an events query for a calendar group.
    pub async fn query_events(
        &self,
        group: &CalendarGroupId,
        request: &WireRequest,
    ) -> Result<EventsResponse> {
        let path = format!("{}/events", self.group_path(group)?);
        tracing::debug!(
            group = %group,
            start = %request.start,
            end = %request.end,
            "Querying events"
        );
        let response = self
            .client
            .post(self.url(&path))
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Get event by ID. Returns `None` on 404.
    pub async fn get_event(
        &self,
        group: &CalendarGroupId,
        id: &EventId,
    ) -> Result<Option<EventEntity>> {
        let path = format!(
            "{}/events/{}",
            self.group_path(group)?,
            urlencoding::encode(id.as_str())
        );
        let response = self.client.get(self.url(&path)).send().await?;
        match self.handle_response(response).await {
            Ok(event) => Ok(Some(event)),
            Err(ClientError::NotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Write label changes.
    pub async fn push_labels(&self, group: &CalendarGroupId, push: &LabelPush) -> Result<()> {
        let path = format!("{}/labels", self.group_path(group)?);
        let response = self.client.post(self.url(&path)).json(push).send().await?;
        self.handle_empty_response(response).await
    }
}

#[async_trait]
impl EventsApi for HttpEventsClient {
    async fn post_for_calendar_group_events(
        &self,
        group: &CalendarGroupId,
        request: &WireRequest,
    ) -> api::Result<EventsResponse> {
        self.query_events(group, request)
            .await
            .map_err(ApiError::from)
    }

    async fn get_event(
        &self,
        group: &CalendarGroupId,
        id: &EventId,
    ) -> api::Result<Option<EventEntity>> {
        HttpEventsClient::get_event(self, group, id)
            .await
            .map_err(ApiError::from)
    }

    async fn push_labels(&self, group: &CalendarGroupId, push: &LabelPush) -> api::Result<()> {
        HttpEventsClient::push_labels(self, group, push)
            .await
            .map_err(ApiError::from)
    }
}
