use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event::{CalendarGroupId, EventEntity, EventId, LabelPush};
use crate::query::WireRequest;

use super::Result;

/// Body of a successful events query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<EventEntity>,
}

/// Remote events API used by the store.
#[async_trait]
pub trait EventsApi: Send + Sync {
    /// Runs an events query for a calendar group.
    async fn post_for_calendar_group_events(
        &self,
        group: &CalendarGroupId,
        request: &WireRequest,
    ) -> Result<EventsResponse>;

    /// Gets one event. `None` if the API does not know it.
    async fn get_event(&self, group: &CalendarGroupId, id: &EventId)
        -> Result<Option<EventEntity>>;

    /// Writes label changes.
    async fn push_labels(&self, group: &CalendarGroupId, push: &LabelPush) -> Result<()>;
}
