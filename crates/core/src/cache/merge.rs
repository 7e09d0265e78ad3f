//! Fetch bookkeeping and response merging for one calendar group.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::invalidate::invalidate_days;
use super::state::{EntityState, FetchState, GroupCache, MergePolicy, QueryResult, RequestId};
use crate::event::{EventEntity, EventId};
use crate::period::{DayOffset, Period};
use crate::query::{reduce, QueryFilter, QueryKey};

/// Marks every day of `days` as being fetched by `request`.
///
/// Days that already hold a result keep it and only record the refresh,
/// so readers never lose data while a refetch is in flight.
pub(crate) fn start_query(
    group: &mut GroupCache,
    days: &Period,
    key: &QueryKey,
    request: RequestId,
) {
    for day in days.indices() {
        let bucket = group.bucket_mut(day);
        let refreshed = match bucket.get_mut(key) {
            Some(FetchState::Result(result)) => {
                result.refreshing = Some(request);
                true
            }
            _ => false,
        };
        if !refreshed {
            bucket.insert(key.clone(), FetchState::Fetching { request });
        }
    }
}

/// Replaces every day of `days` with a fresh result built from `events`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn end_query(
    group: &mut GroupCache,
    days: &Period,
    key: &QueryKey,
    query: &QueryFilter,
    request: RequestId,
    events: &[EventEntity],
    received_at: DateTime<Utc>,
    policy: MergePolicy,
) {
    let mut lists: BTreeMap<DayOffset, Vec<EventId>> =
        days.indices().map(|day| (day, Vec::new())).collect();
    let mut placed = HashSet::new();

    for event in events {
        if placed.insert(event.id.clone()) {
            if let Some(overlap) = event.span().intersect(days) {
                for day in overlap.indices() {
                    if let Some(ids) = lists.get_mut(&day) {
                        ids.push(event.id.clone());
                    }
                }
            }
        }
        group.upsert_entity(event.clone());
    }

    let query = reduce(query);
    for (day, event_ids) in lists {
        let invalid = policy == MergePolicy::RejectStale
            && group.invalidated_at(day).is_some_and(|at| at > request);
        let bucket = group.bucket_mut(day);
        // A newer fetch for the same entry is still running; keep tracking it.
        let refreshing = match bucket.get(key) {
            Some(FetchState::Fetching { request: current }) if *current > request => Some(*current),
            Some(FetchState::Result(QueryResult {
                refreshing: Some(current),
                ..
            })) if *current > request => Some(*current),
            _ => None,
        };
        bucket.insert(
            key.clone(),
            FetchState::Result(QueryResult {
                query: query.clone(),
                event_ids,
                updated_on: received_at,
                invalid,
                refreshing,
            }),
        );
    }
}

/// Records a failed fetch without downgrading results or newer fetches.
pub(crate) fn fail_query(
    group: &mut GroupCache,
    days: &Period,
    key: &QueryKey,
    request: RequestId,
) {
    for day in days.indices() {
        let bucket = group.bucket_mut(day);
        let failed = match bucket.get_mut(key) {
            Some(FetchState::Result(result)) => {
                if result.refreshing.is_some_and(|current| current <= request) {
                    result.refreshing = None;
                }
                false
            }
            Some(FetchState::Fetching { request: current }) => *current <= request,
            Some(FetchState::FetchError) => false,
            None => true,
        };
        if failed {
            bucket.insert(key.clone(), FetchState::FetchError);
        }
    }
}

pub(crate) fn start_event(group: &mut GroupCache, id: &EventId, request: RequestId) {
    let entities = group.entities_mut();
    if !matches!(entities.get(id), Some(EntityState::Entity(_))) {
        entities.insert(id.clone(), EntityState::Fetching { request });
    }
}

pub(crate) fn end_event(
    group: &mut GroupCache,
    id: &EventId,
    request: RequestId,
    event: Option<&EventEntity>,
) {
    let Some(event) = event else {
        fail_event(group, id, request);
        return;
    };
    let stored = group.upsert_entity(event.clone());
    if &stored.id != id && !stored.duplicates.contains(id) {
        group
            .entities_mut()
            .insert(id.clone(), EntityState::Entity(stored));
    }
}

pub(crate) fn fail_event(group: &mut GroupCache, id: &EventId, request: RequestId) {
    let entities = group.entities_mut();
    let failed = match entities.get(id) {
        Some(EntityState::Entity(_)) | Some(EntityState::FetchError) => false,
        Some(EntityState::Fetching { request: current }) => *current <= request,
        None => true,
    };
    if failed {
        entities.insert(id.clone(), EntityState::FetchError);
    }
}

/// Upserts pushed events and invalidates both their previous and new spans.
pub(crate) fn update_events(
    group: &mut GroupCache,
    events: &[EventEntity],
    version: u64,
) -> Vec<Period> {
    let mut invalidated = Vec::new();
    for event in events {
        let previous = group.entity(&event.id).map(|current| current.span());
        let stored = group.upsert_entity(event.clone());
        let span = stored.span();
        invalidate_days(group, &span, version);
        invalidated.push(span);
        if let Some(previous) = previous.filter(|previous| *previous != span) {
            invalidate_days(group, &previous, version);
            invalidated.push(previous);
        }
    }
    invalidated
}
