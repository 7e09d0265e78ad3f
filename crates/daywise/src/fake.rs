//! In-memory events API for store tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use daywise_core::api::{ApiError, EventsApi, EventsResponse, Result};
use daywise_core::event::{CalendarGroupId, EventEntity, EventId, LabelPush};
use daywise_core::query::WireRequest;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Query(WireRequest),
    Event(EventId),
    Push(LabelPush),
}

/// Serves a fixed event list. Queries can be held back behind a gate and
/// made to fail by start date.
pub(crate) struct FakeApi {
    events: Vec<EventEntity>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<NaiveDate>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    pub(crate) fn new(events: Vec<EventEntity>) -> Self {
        Self {
            events,
            calls: Mutex::default(),
            failing: Mutex::default(),
            gate: None,
        }
    }

    /// Every query and event fetch waits for one permit of the returned
    /// semaphore.
    pub(crate) fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Fails every query whose range starts on `date`.
    pub(crate) fn fail_from(&self, date: NaiveDate) {
        self.failing.lock().unwrap().insert(date);
    }

    pub(crate) fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn query_calls(&self) -> Vec<WireRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Query(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl EventsApi for FakeApi {
    async fn post_for_calendar_group_events(
        &self,
        _group: &CalendarGroupId,
        request: &WireRequest,
    ) -> Result<EventsResponse> {
        self.record(Call::Query(request.clone()));
        self.pass_gate().await;
        if self.failing.lock().unwrap().contains(&request.start) {
            return Err(ApiError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        let events = self
            .events
            .iter()
            .filter(|event| {
                event.start.date() <= request.end && event.end.date() >= request.start
            })
            .cloned()
            .collect();
        Ok(EventsResponse { events })
    }

    async fn get_event(
        &self,
        _group: &CalendarGroupId,
        id: &EventId,
    ) -> Result<Option<EventEntity>> {
        self.record(Call::Event(id.clone()));
        self.pass_gate().await;
        Ok(self.events.iter().find(|event| &event.id == id).cloned())
    }

    async fn push_labels(&self, _group: &CalendarGroupId, push: &LabelPush) -> Result<()> {
        self.record(Call::Push(push.clone()));
        Ok(())
    }
}
