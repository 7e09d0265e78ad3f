//! Reading events back out of the cache.

use std::collections::HashSet;

use super::state::{CacheState, FetchState};
use crate::event::{CalendarGroupId, EventEntity, EventId};
use crate::period::{to_days, Period};
use crate::query::{query_key, QueryFilter};

/// Visits every visible event cached for `filter` over `period`, once each.
///
/// Returns false without visiting anything if any day of the period is not
/// loaded yet (missing, fetching or failed). Invalid and stale lists still
/// count as loaded.
pub fn iter_events<F>(
    state: &CacheState,
    group_id: &CalendarGroupId,
    period: &Period,
    filter: &QueryFilter,
    mut visit: F,
) -> bool
where
    F: FnMut(&EventEntity),
{
    let Some(group) = state.group(group_id) else {
        return false;
    };
    let key = query_key(filter);

    let mut lists: Vec<&[EventId]> = Vec::new();
    for day in to_days(period).indices() {
        match group.entry(day, &key) {
            Some(FetchState::Result(result)) => lists.push(&result.event_ids),
            _ => return false,
        }
    }

    let mut visited = HashSet::new();
    for id in lists.into_iter().flatten() {
        let Some(event) = group.entity(id) else {
            continue;
        };
        if !visited.insert(&event.id) || event.hidden {
            continue;
        }
        visit(event.as_ref());
    }
    true
}

/// Collects the events [`iter_events`] would visit, or `None` if the
/// period is not loaded.
pub fn collect_events(
    state: &CacheState,
    group_id: &CalendarGroupId,
    period: &Period,
    filter: &QueryFilter,
) -> Option<Vec<EventEntity>> {
    let mut events = Vec::new();
    let ready = iter_events(state, group_id, period, filter, |event| {
        events.push(event.clone());
    });
    ready.then_some(events)
}
