//! Queue draining and the network side of the store.

use std::sync::Arc;

use chrono::Utc;
use daywise_core::api::EventsApi;
use daywise_core::cache::{plan_fetch, Action, PlanOptions, RequestId};
use daywise_core::event::{CalendarGroupId, EventId, LabelPush};
use daywise_core::period::{to_days, Period};
use daywise_core::query::{query_key, QueryFilter, WireRequest};
use daywise_core::queue::{FetchRequest, PendingRequest};
use futures_util::future::{join_all, BoxFuture, FutureExt};

use super::{FetchHandle, Inner, SharedFetch};
use crate::error::{Result, StoreError};

pub(super) fn plan_options<A>(inner: &Inner<A>, request: &FetchRequest) -> PlanOptions {
    let defaults = inner.config.plan_options();
    PlanOptions {
        max_days_fetch: request.max_days_fetch.or(defaults.max_days_fetch),
        ..defaults
    }
}

/// Returns true if every day of the request is loaded and nothing is in
/// flight for it.
pub(super) async fn is_loaded<A>(inner: &Inner<A>, request: &FetchRequest) -> bool {
    let key = query_key(&request.query);
    let days = to_days(&request.period);
    let in_flight = inner.in_flight.lock().await;
    if in_flight
        .overlapping(&request.group, &key, &days)
        .next()
        .is_some()
    {
        return false;
    }
    let state = inner.state.read().await;
    plan_fetch(
        &state,
        &request.group,
        &request.period,
        &request.query,
        Utc::now(),
        plan_options(inner, request),
    )
    .is_empty()
}

/// Queues a request for its group and makes sure a drain task is running.
pub(super) async fn enqueue<A: EventsApi + 'static>(
    inner: &Arc<Inner<A>>,
    group: CalendarGroupId,
    request: PendingRequest,
) -> FetchHandle {
    let (reply, handle) = FetchHandle::channel();
    let mut queues = inner.queues.lock().await;
    let queue = queues.entry(group.clone()).or_default();
    let seq = queue.requests.push(request, reply);
    tracing::trace!(group = %group, seq, pending = queue.requests.len(), "Queued request");
    if !queue.draining {
        queue.draining = true;
        tokio::spawn(drain(Arc::clone(inner), group));
    }
    handle
}

/// Processes a group's queue until it is empty: label pushes first, then
/// fetches by priority. Each request resolves its own handle.
async fn drain<A: EventsApi + 'static>(inner: Arc<Inner<A>>, group: CalendarGroupId) {
    loop {
        let batch = {
            let mut queues = inner.queues.lock().await;
            let queue = queues.entry(group.clone()).or_default();
            let batch = queue.requests.drain();
            if batch.is_empty() {
                queue.draining = false;
                return;
            }
            batch
        };
        tracing::debug!(group = %group, requests = batch.len(), "Draining request queue");

        for queued in batch {
            match queued.request {
                PendingRequest::LabelPush(push) => {
                    let result = push_labels(&inner, &group, &push).await;
                    let _ = queued.reply.send(result);
                }
                PendingRequest::Fetch(request) => {
                    let done = start_fetch(&inner, &request).await;
                    let reply = queued.reply;
                    tokio::spawn(async move {
                        let _ = reply.send(done.await);
                    });
                }
            }
        }
    }
}

/// Plans a fetch request, starts the missing ranges and returns a future
/// resolving once every overlapping fetch (new or already running) is done.
async fn start_fetch<A: EventsApi + 'static>(
    inner: &Arc<Inner<A>>,
    request: &FetchRequest,
) -> BoxFuture<'static, Result<()>> {
    let key = query_key(&request.query);
    let days = to_days(&request.period);

    let mut in_flight = inner.in_flight.lock().await;
    let mut waits: Vec<SharedFetch> = in_flight
        .overlapping(&request.group, &key, &days)
        .map(|entry| entry.handle.clone())
        .collect();
    let attached = waits.len();

    let mut started = Vec::new();
    {
        let mut state = inner.state.write().await;
        let plan = plan_fetch(
            &state,
            &request.group,
            &request.period,
            &request.query,
            Utc::now(),
            plan_options(inner, request),
        );
        for range in plan.ranges {
            let id = state.next_version();
            state.apply(&Action::FetchQueryStart {
                group: request.group.clone(),
                period: range,
                query: request.query.clone(),
                request: id,
            });
            started.push((id, range));
        }
    }

    for (id, range) in &started {
        let fetch = fetch_range(
            Arc::clone(inner),
            request.group.clone(),
            *range,
            request.query.clone(),
            *id,
        )
        .boxed()
        .shared();
        in_flight.insert(&request.group, &key, *id, *range, fetch.clone());
        tokio::spawn(fetch.clone());
        waits.push(fetch);
    }
    drop(in_flight);

    tracing::debug!(
        group = %request.group,
        %key,
        days = %days,
        priority = request.priority,
        attached,
        started = started.len(),
        "Started fetch"
    );

    async move {
        join_all(waits)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()
            .map(|_| ())
    }
    .boxed()
}

async fn fetch_range<A: EventsApi>(
    inner: Arc<Inner<A>>,
    group: CalendarGroupId,
    days: Period,
    query: QueryFilter,
    request: RequestId,
) -> Result<()> {
    let response = match WireRequest::for_period(&days, &query) {
        Ok(wire) => inner
            .api
            .post_for_calendar_group_events(&group, &wire)
            .await
            .map_err(StoreError::from),
        Err(error) => Err(StoreError::from(error)),
    };

    let (action, outcome) = match response {
        Ok(response) => {
            tracing::debug!(
                group = %group,
                days = %days,
                events = response.events.len(),
                "Fetched events"
            );
            let action = Action::FetchQueryEnd {
                group: group.clone(),
                period: days,
                query: query.clone(),
                request,
                events: response.events,
                received_at: Utc::now(),
            };
            (action, Ok(()))
        }
        Err(error) => {
            tracing::warn!(group = %group, days = %days, %error, "Fetch failed");
            let action = Action::FetchQueryFail {
                group: group.clone(),
                period: days,
                query: query.clone(),
                request,
            };
            (action, Err(error))
        }
    };

    inner.state.write().await.apply(&action);
    inner
        .in_flight
        .lock()
        .await
        .remove(&group, &query_key(&query), request);
    outcome
}

/// Starts or joins the fetch of one event.
pub(super) async fn request_event<A: EventsApi + 'static>(
    inner: &Arc<Inner<A>>,
    group: &CalendarGroupId,
    id: &EventId,
) -> FetchHandle {
    let mut fetches = inner.event_fetches.lock().await;
    let map_key = (group.clone(), id.clone());
    let fetch = match fetches.get(&map_key) {
        Some((_, fetch)) => {
            tracing::trace!(group = %group, event_id = %id, "Joining event fetch");
            fetch.clone()
        }
        None => {
            let request = {
                let mut state = inner.state.write().await;
                if state
                    .group(group)
                    .and_then(|cache| cache.entity(id))
                    .is_some()
                {
                    tracing::trace!(group = %group, event_id = %id, "Cache hit");
                    return FetchHandle::ready();
                }
                let request = state.next_version();
                state.apply(&Action::FetchEventStart {
                    group: group.clone(),
                    event_id: id.clone(),
                    request,
                });
                request
            };
            let fetch = fetch_event(Arc::clone(inner), group.clone(), id.clone(), request)
                .boxed()
                .shared();
            fetches.insert(map_key, (request, fetch.clone()));
            tokio::spawn(fetch.clone());
            fetch
        }
    };
    drop(fetches);

    let (reply, handle) = FetchHandle::channel();
    tokio::spawn(async move {
        let _ = reply.send(fetch.await);
    });
    handle
}

async fn fetch_event<A: EventsApi>(
    inner: Arc<Inner<A>>,
    group: CalendarGroupId,
    id: EventId,
    request: RequestId,
) -> Result<()> {
    let (action, outcome) = match inner.api.get_event(&group, &id).await {
        Ok(event) => {
            let outcome = match event {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound(id.clone())),
            };
            let action = Action::FetchEventEnd {
                group: group.clone(),
                event_id: id.clone(),
                request,
                event,
            };
            (action, outcome)
        }
        Err(error) => {
            tracing::warn!(group = %group, event_id = %id, %error, "Event fetch failed");
            let action = Action::FetchEventFail {
                group: group.clone(),
                event_id: id.clone(),
                request,
            };
            (action, Err(StoreError::from(error)))
        }
    };

    inner.state.write().await.apply(&action);
    // A reset may have let a newer fetch of the same event take the slot.
    let mut fetches = inner.event_fetches.lock().await;
    let map_key = (group, id);
    if fetches
        .get(&map_key)
        .is_some_and(|(current, _)| *current == request)
    {
        fetches.remove(&map_key);
    }
    outcome
}

async fn push_labels<A: EventsApi>(
    inner: &Inner<A>,
    group: &CalendarGroupId,
    push: &LabelPush,
) -> Result<()> {
    match inner.api.push_labels(group, push).await {
        Ok(()) => {
            tracing::debug!(
                group = %group,
                set = push.set_labels.len(),
                predict = push.predict_labels.len(),
                "Pushed labels"
            );
            Ok(())
        }
        Err(error) => {
            tracing::warn!(group = %group, %error, "Label push failed");
            Err(StoreError::from(error))
        }
    }
}
