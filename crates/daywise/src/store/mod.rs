//! The event store: owns the cache state and all traffic to the events API.
//!
//! Every cache mutation goes through [`Action`]s applied under one write
//! lock, so readers never observe a half-applied merge or invalidation.
//! Network calls run on spawned tasks; their results come back as actions.

mod fetch;
mod handle;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use daywise_core::api::EventsApi;
use daywise_core::cache::{
    collect_events, iter_events, label_push, plan_fetch, Action, Applied, CacheState, EventEdit,
    FetchPlan, PlanOptions, RequestId,
};
use daywise_core::event::{CalendarGroupId, EventEntity, EventId};
use daywise_core::period::{to_days, Period};
use daywise_core::query::QueryFilter;
use daywise_core::queue::{FetchRequest, InFlightIndex, PendingRequest, RequestQueue};
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{oneshot, Mutex, RwLock};

pub use handle::FetchHandle;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::worker::{TaskOutcome, TaskSpec, TaskWorker};

type SharedFetch = Shared<BoxFuture<'static, Result<()>>>;

#[derive(Default)]
struct GroupQueue {
    requests: RequestQueue<oneshot::Sender<Result<()>>>,
    draining: bool,
}

struct Inner<A> {
    api: A,
    config: StoreConfig,
    state: RwLock<CacheState>,
    queues: Mutex<HashMap<CalendarGroupId, GroupQueue>>,
    in_flight: Mutex<InFlightIndex<SharedFetch>>,
    event_fetches: Mutex<HashMap<(CalendarGroupId, EventId), (RequestId, SharedFetch)>>,
}

/// Owned, versioned event cache backed by an [`EventsApi`].
///
/// Cloning is cheap and every clone shares the same state.
pub struct EventStore<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for EventStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: EventsApi + 'static> EventStore<A> {
    pub fn new(api: A, config: StoreConfig) -> Self {
        let state = CacheState::with_policy(config.merge_policy());
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                state: RwLock::new(state),
                queues: Mutex::default(),
                in_flight: Mutex::new(InFlightIndex::new()),
                event_fetches: Mutex::default(),
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Makes `request.period` readable for `request.query`.
    ///
    /// Returns an already resolved handle when every day is loaded.
    /// Otherwise the request is queued for its group and attaches to any
    /// running fetch that overlaps it.
    pub async fn request_fetch(&self, request: FetchRequest) -> FetchHandle {
        if fetch::is_loaded(&self.inner, &request).await {
            tracing::trace!(
                group = %request.group,
                period = %request.period,
                "Cache hit"
            );
            return FetchHandle::ready();
        }
        let group = request.group.clone();
        fetch::enqueue(&self.inner, group, PendingRequest::Fetch(request)).await
    }

    /// Fetches if needed, then returns the visible events of the period.
    pub async fn load(&self, request: FetchRequest) -> Result<Vec<EventEntity>> {
        let group = request.group.clone();
        let period = request.period;
        let query = request.query.clone();
        self.request_fetch(request).await.wait().await?;
        self.collect(&group, &period, &query)
            .await
            .ok_or(StoreError::NotReady { group })
    }

    /// Loads one event into the entity map unless it is already there.
    pub async fn request_event(&self, group: &CalendarGroupId, id: &EventId) -> FetchHandle {
        fetch::request_event(&self.inner, group, id).await
    }

    pub async fn event(&self, group: &CalendarGroupId, id: &EventId) -> Option<EventEntity> {
        let state = self.inner.state.read().await;
        state
            .group(group)
            .and_then(|cache| cache.entity(id))
            .map(|event| EventEntity::clone(event))
    }

    /// Applies a local edit without telling the API.
    pub async fn edit_events(&self, group: &CalendarGroupId, edit: EventEdit) -> Applied {
        self.apply(Action::EditEvents {
            group: group.clone(),
            edit,
        })
        .await
    }

    /// Applies a label edit locally, then queues the matching write. The
    /// write is sent before any fetch queued for the group.
    pub async fn push_labels(&self, group: &CalendarGroupId, edit: EventEdit) -> FetchHandle {
        let push = {
            let mut state = self.inner.state.write().await;
            let applied = state.apply(&Action::EditEvents {
                group: group.clone(),
                edit,
            });
            state
                .group(group)
                .map(|cache| label_push(cache, &applied.mutated))
                .unwrap_or_default()
        };
        if push.is_empty() {
            tracing::debug!(group = %group, "Edit matched no loaded events");
            return FetchHandle::ready();
        }
        fetch::enqueue(&self.inner, group.clone(), PendingRequest::LabelPush(push)).await
    }

    /// Invalidates a period, widened to events crossing its edges. Returns
    /// the invalidated days.
    pub async fn invalidate_period(&self, group: &CalendarGroupId, period: &Period) -> Period {
        let applied = self
            .apply(Action::InvalidatePeriod {
                group: group.clone(),
                period: *period,
            })
            .await;
        applied
            .invalidated
            .first()
            .copied()
            .unwrap_or_else(|| to_days(period))
    }

    /// Upserts events changed elsewhere and invalidates where they moved.
    pub async fn update_events(
        &self,
        group: &CalendarGroupId,
        events: Vec<EventEntity>,
    ) -> Applied {
        self.apply(Action::EventsUpdate {
            group: group.clone(),
            events,
        })
        .await
    }

    /// Drops everything cached for a group. Responses to fetches started
    /// before the reset are discarded.
    pub async fn reset_group(&self, group: &CalendarGroupId) {
        self.apply(Action::ResetGroup {
            group: group.clone(),
        })
        .await;
        self.inner.in_flight.lock().await.clear_group(group);
        self.inner
            .event_fetches
            .lock()
            .await
            .retain(|(fetch_group, _), _| fetch_group != group);
        tracing::info!(group = %group, "Reset calendar group");
    }

    /// A copy of the current state; cheap thanks to structural sharing.
    pub async fn snapshot(&self) -> CacheState {
        self.inner.state.read().await.clone()
    }

    /// What a fetch of `period` would request right now.
    pub async fn plan(
        &self,
        group: &CalendarGroupId,
        period: &Period,
        filter: &QueryFilter,
    ) -> FetchPlan {
        let state = self.inner.state.read().await;
        plan_fetch(
            &state,
            group,
            period,
            filter,
            Utc::now(),
            self.plan_options(),
        )
    }

    pub fn plan_options(&self) -> PlanOptions {
        self.inner.config.plan_options()
    }

    /// See [`iter_events`].
    pub async fn iter<F>(
        &self,
        group: &CalendarGroupId,
        period: &Period,
        filter: &QueryFilter,
        visit: F,
    ) -> bool
    where
        F: FnMut(&EventEntity),
    {
        let state = self.inner.state.read().await;
        iter_events(&state, group, period, filter, visit)
    }

    /// See [`collect_events`].
    pub async fn collect(
        &self,
        group: &CalendarGroupId,
        period: &Period,
        filter: &QueryFilter,
    ) -> Option<Vec<EventEntity>> {
        let state = self.inner.state.read().await;
        collect_events(&state, group, period, filter)
    }

    /// Runs a task against a snapshot on the background worker.
    pub async fn run_task<R: Send + 'static>(
        &self,
        worker: &TaskWorker<R>,
        spec: TaskSpec,
    ) -> Result<TaskOutcome<R>> {
        worker.run(self.snapshot().await, spec).await
    }

    async fn apply(&self, action: Action) -> Applied {
        self.inner.state.write().await.apply(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeApi};
    use chrono::{NaiveDate, NaiveDateTime};
    use daywise_core::cache::{day_status, DayStatus, EventChange};
    use daywise_core::period::day_offset;
    use daywise_core::query::query_key;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn oct(day: u32) -> i64 {
        day_offset(NaiveDate::from_ymd_opt(2024, 10, day).unwrap())
    }

    fn days(first: u32, last: u32) -> Period {
        Period::days(oct(first), oct(last))
    }

    fn group() -> CalendarGroupId {
        CalendarGroupId::new("team")
    }

    fn events() -> Vec<EventEntity> {
        vec![
            EventEntity::new("e1", at(1, 9), at(1, 10)).with_labels(["standup"]),
            EventEntity::new("e2", at(2, 22), at(3, 2)),
            EventEntity::new("e3", at(9, 9), at(9, 10)),
        ]
    }

    fn config() -> StoreConfig {
        StoreConfig {
            stale_seconds: 300,
            max_days_fetch: None,
            reject_stale_merges: false,
            worker_queue: 4,
        }
    }

    fn request(period: Period) -> FetchRequest {
        FetchRequest::new(group(), period, QueryFilter::new())
    }

    async fn wait_for_calls(store: &EventStore<FakeApi>, count: usize) {
        for _ in 0..1_000 {
            if store.api().calls().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} API calls, saw {:?}", store.api().calls());
    }

    #[tokio::test]
    async fn test_load_fetches_once_then_serves_from_cache() {
        let store = EventStore::new(FakeApi::new(events()), config());

        let loaded = store.load(request(days(1, 7))).await.unwrap();
        let ids: Vec<_> = loaded.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);

        let again = store.load(request(days(2, 3))).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(store.api().query_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let (api, gate) = FakeApi::new(events()).gated();
        let store = EventStore::new(api, config());

        let first = store.request_fetch(request(days(1, 7))).await;
        let second = store.request_fetch(request(days(1, 7))).await;
        wait_for_calls(&store, 1).await;
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.api().query_calls().len(), 1);

        gate.add_permits(10);
        assert_eq!(first.wait().await, Ok(()));
        assert_eq!(second.wait().await, Ok(()));
        assert_eq!(store.api().query_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_request_fetches_only_the_gap() {
        let (api, gate) = FakeApi::new(events()).gated();
        let store = EventStore::new(api, config());

        let first = store.request_fetch(request(days(1, 7))).await;
        wait_for_calls(&store, 1).await;
        let second = store.request_fetch(request(days(5, 10))).await;
        wait_for_calls(&store, 2).await;

        gate.add_permits(10);
        assert_eq!(second.wait().await, Ok(()));
        assert_eq!(first.wait().await, Ok(()));

        let calls = store.api().query_calls();
        assert_eq!(
            calls[1].start,
            NaiveDate::from_ymd_opt(2024, 10, 8).unwrap()
        );
        assert_eq!(calls[1].end, NaiveDate::from_ymd_opt(2024, 10, 10).unwrap());
        let loaded = store
            .collect(&group(), &days(1, 10), &QueryFilter::new())
            .await;
        assert_eq!(loaded.map(|events| events.len()), Some(3));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_request() {
        let api = FakeApi::new(events());
        api.fail_from(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        let store = EventStore::new(api, config());

        let failing = store.request_fetch(request(days(1, 2))).await;
        let working = store.request_fetch(request(days(8, 9))).await;

        assert!(matches!(failing.wait().await, Err(StoreError::Fetch(_))));
        assert_eq!(working.wait().await, Ok(()));

        let snapshot = store.snapshot().await;
        let key = query_key(&QueryFilter::new());
        let status = |day| day_status(snapshot.group(&group()), day, &key, Utc::now(), None);
        assert_eq!(status(oct(1)), DayStatus::Failed);
        assert_eq!(status(oct(8)), DayStatus::Fresh);

        store.api().heal();
        assert_eq!(
            store.load(request(days(1, 2))).await.map(|e| e.len()),
            Ok(2)
        );
    }

    #[tokio::test]
    async fn test_label_push_runs_before_queued_fetches() {
        let store = EventStore::new(FakeApi::new(events()), config());
        store.load(request(days(1, 7))).await.unwrap();

        let fetch = store.request_fetch(request(days(8, 14))).await;
        let push = store
            .push_labels(
                &group(),
                EventEdit::events(["e1"], EventChange::add_labels(["Focus"])),
            )
            .await;
        assert_eq!(push.wait().await, Ok(()));
        assert_eq!(fetch.wait().await, Ok(()));

        let calls = store.api().calls();
        assert!(matches!(calls[1], Call::Push(_)), "{calls:?}");
        assert!(matches!(calls[2], Call::Query(_)), "{calls:?}");
        let Call::Push(push) = &calls[1] else {
            unreachable!()
        };
        assert!(push.set_labels[0].labels.contains("focus"));

        let e1 = store.event(&group(), &"e1".into()).await.unwrap();
        assert!(e1.labels.contains("focus"));
        let plan = store.plan(&group(), &days(1, 7), &QueryFilter::new()).await;
        assert_eq!(plan.ranges, vec![days(1, 1)]);
    }

    #[tokio::test]
    async fn test_push_for_unknown_events_is_skipped() {
        let store = EventStore::new(FakeApi::new(events()), config());
        let push = store
            .push_labels(&group(), EventEdit::events(["nope"], EventChange::Hide))
            .await;
        assert_eq!(push.wait().await, Ok(()));
        assert!(store.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_late_merge_policy() {
        for (reject_stale_merges, replanned) in [(false, false), (true, true)] {
            let (api, gate) = FakeApi::new(events()).gated();
            let store = EventStore::new(
                api,
                StoreConfig {
                    reject_stale_merges,
                    ..config()
                },
            );

            let handle = store.request_fetch(request(days(1, 2))).await;
            wait_for_calls(&store, 1).await;
            store.invalidate_period(&group(), &days(1, 2)).await;
            gate.add_permits(1);
            assert_eq!(handle.wait().await, Ok(()));

            let plan = store.plan(&group(), &days(1, 2), &QueryFilter::new()).await;
            assert_eq!(!plan.is_empty(), replanned, "reject={reject_stale_merges}");
        }
    }

    #[tokio::test]
    async fn test_request_event_coalesces_and_reports_missing() {
        let (api, gate) = FakeApi::new(events()).gated();
        let store = EventStore::new(api, config());

        let first = store.request_event(&group(), &"e3".into()).await;
        let second = store.request_event(&group(), &"e3".into()).await;
        gate.add_permits(10);
        assert_eq!(first.wait().await, Ok(()));
        assert_eq!(second.wait().await, Ok(()));
        assert_eq!(store.api().calls().len(), 1);
        assert!(store.event(&group(), &"e3".into()).await.is_some());

        let cached = store.request_event(&group(), &"e3".into()).await;
        assert_eq!(cached.wait().await, Ok(()));
        assert_eq!(store.api().calls().len(), 1);

        let missing = store.request_event(&group(), &"nope".into()).await;
        assert_eq!(
            missing.wait().await,
            Err(StoreError::NotFound(EventId::new("nope")))
        );
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_responses() {
        let (api, gate) = FakeApi::new(events()).gated();
        let store = EventStore::new(api, config());

        let handle = store.request_fetch(request(days(1, 2))).await;
        wait_for_calls(&store, 1).await;
        store.reset_group(&group()).await;
        gate.add_permits(10);
        assert_eq!(handle.wait().await, Ok(()));

        assert!(store.snapshot().await.group(&group()).is_none());
        let dropped = store
            .collect(&group(), &days(1, 2), &QueryFilter::new())
            .await;
        assert_eq!(dropped, None);
        let reloaded = store.load(request(days(1, 2))).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(store.api().query_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_restarts_event_fetches() {
        let (api, gate) = FakeApi::new(events()).gated();
        let store = EventStore::new(api, config());

        let stale = store.request_event(&group(), &"e1".into()).await;
        wait_for_calls(&store, 1).await;
        store.reset_group(&group()).await;
        let fresh = store.request_event(&group(), &"e1".into()).await;
        wait_for_calls(&store, 2).await;
        gate.add_permits(10);

        assert_eq!(stale.wait().await, Ok(()));
        assert_eq!(fresh.wait().await, Ok(()));
        assert!(store.event(&group(), &"e1".into()).await.is_some());
        assert_eq!(store.api().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_update_events_moves_event_between_days() {
        let store = EventStore::new(FakeApi::new(events()), config());
        store.load(request(days(1, 7))).await.unwrap();

        let mut moved = events().remove(0);
        moved.start = at(5, 9);
        moved.end = at(5, 10);
        let applied = store.update_events(&group(), vec![moved]).await;

        assert_eq!(applied.invalidated.len(), 2);
        let plan = store.plan(&group(), &days(1, 7), &QueryFilter::new()).await;
        assert_eq!(plan.ranges, vec![days(1, 1), days(5, 5)]);
    }

    #[tokio::test]
    async fn test_iter_counts_visible_events() {
        let store = EventStore::new(FakeApi::new(events()), config());
        let mut count = 0;
        let ready = store
            .iter(&group(), &days(1, 3), &QueryFilter::new(), |_| count += 1)
            .await;
        assert!(!ready);

        store.load(request(days(1, 3))).await.unwrap();
        let ready = store
            .iter(&group(), &days(1, 3), &QueryFilter::new(), |_| count += 1)
            .await;
        assert!(ready);
        assert_eq!(count, 2);
    }
}
