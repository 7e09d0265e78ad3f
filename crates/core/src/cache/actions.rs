//! Cache actions and the pure `(state, action) -> state'` transition.

use chrono::{DateTime, Utc};

use super::edit::{apply_edit, EventEdit};
use super::invalidate::invalidate_period;
use super::merge;
use super::state::{CacheState, RequestId};
use crate::event::{CalendarGroupId, EventEntity, EventId};
use crate::period::{to_days, Period};
use crate::query::{query_key, QueryFilter};

/// A data update applied to the cache.
///
/// Periods may use any interval; they are widened to whole days when
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchQueryStart {
        group: CalendarGroupId,
        period: Period,
        query: QueryFilter,
        request: RequestId,
    },
    FetchQueryEnd {
        group: CalendarGroupId,
        period: Period,
        query: QueryFilter,
        request: RequestId,
        events: Vec<EventEntity>,
        received_at: DateTime<Utc>,
    },
    FetchQueryFail {
        group: CalendarGroupId,
        period: Period,
        query: QueryFilter,
        request: RequestId,
    },
    FetchEventStart {
        group: CalendarGroupId,
        event_id: EventId,
        request: RequestId,
    },
    FetchEventEnd {
        group: CalendarGroupId,
        event_id: EventId,
        request: RequestId,
        /// `None` when the API does not know the event.
        event: Option<EventEntity>,
    },
    FetchEventFail {
        group: CalendarGroupId,
        event_id: EventId,
        request: RequestId,
    },
    /// Events changed elsewhere; upsert them and invalidate where they
    /// were and where they are now.
    EventsUpdate {
        group: CalendarGroupId,
        events: Vec<EventEntity>,
    },
    EditEvents {
        group: CalendarGroupId,
        edit: EventEdit,
    },
    InvalidatePeriod {
        group: CalendarGroupId,
        period: Period,
    },
    ResetGroup {
        group: CalendarGroupId,
    },
}

impl Action {
    pub fn group(&self) -> &CalendarGroupId {
        match self {
            Action::FetchQueryStart { group, .. }
            | Action::FetchQueryEnd { group, .. }
            | Action::FetchQueryFail { group, .. }
            | Action::FetchEventStart { group, .. }
            | Action::FetchEventEnd { group, .. }
            | Action::FetchEventFail { group, .. }
            | Action::EventsUpdate { group, .. }
            | Action::EditEvents { group, .. }
            | Action::InvalidatePeriod { group, .. }
            | Action::ResetGroup { group } => group,
        }
    }

    /// Fetch id carried by fetch actions.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            Action::FetchQueryStart { request, .. }
            | Action::FetchQueryEnd { request, .. }
            | Action::FetchQueryFail { request, .. }
            | Action::FetchEventStart { request, .. }
            | Action::FetchEventEnd { request, .. }
            | Action::FetchEventFail { request, .. } => Some(*request),
            _ => None,
        }
    }

    /// Returns true for actions that finish a fetch.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            Action::FetchQueryEnd { .. }
                | Action::FetchQueryFail { .. }
                | Action::FetchEventEnd { .. }
                | Action::FetchEventFail { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::FetchQueryStart { .. } => "FETCH_QUERY_START",
            Action::FetchQueryEnd { .. } => "FETCH_QUERY_END",
            Action::FetchQueryFail { .. } => "FETCH_QUERY_FAIL",
            Action::FetchEventStart { .. } => "FETCH_EVENT_START",
            Action::FetchEventEnd { .. } => "FETCH_EVENT_END",
            Action::FetchEventFail { .. } => "FETCH_EVENT_FAIL",
            Action::EventsUpdate { .. } => "EVENTS_UPDATE",
            Action::EditEvents { .. } => "EDIT_EVENTS",
            Action::InvalidatePeriod { .. } => "INVALIDATE_PERIOD",
            Action::ResetGroup { .. } => "RESET_GROUP",
        }
    }
}

/// What applying one action changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// State version after the action.
    pub version: u64,
    /// Events rewritten by an edit.
    pub mutated: Vec<EventId>,
    /// Day ranges flagged invalid.
    pub invalidated: Vec<Period>,
}

impl CacheState {
    /// Applies `action` in place. Every action bumps the version, even when
    /// it changes nothing.
    pub fn apply(&mut self, action: &Action) -> Applied {
        let version = self.bump_version();
        let policy = self.policy();
        let mut applied = Applied {
            version,
            ..Applied::default()
        };

        if let Some(request) = action.request() {
            if action.is_completion() && self.is_superseded(action.group(), request) {
                tracing::debug!(
                    action = action.name(),
                    group = %action.group(),
                    request,
                    "Dropping response from before group reset"
                );
                return applied;
            }
        }

        match action {
            Action::FetchQueryStart {
                group,
                period,
                query,
                request,
            } => {
                let key = query_key(query);
                merge::start_query(self.group_mut(group), &to_days(period), &key, *request);
            }
            Action::FetchQueryEnd {
                group,
                period,
                query,
                request,
                events,
                received_at,
            } => {
                let key = query_key(query);
                merge::end_query(
                    self.group_mut(group),
                    &to_days(period),
                    &key,
                    query,
                    *request,
                    events,
                    *received_at,
                    policy,
                );
            }
            Action::FetchQueryFail {
                group,
                period,
                query,
                request,
            } => {
                let key = query_key(query);
                merge::fail_query(self.group_mut(group), &to_days(period), &key, *request);
            }
            Action::FetchEventStart {
                group,
                event_id,
                request,
            } => merge::start_event(self.group_mut(group), event_id, *request),
            Action::FetchEventEnd {
                group,
                event_id,
                request,
                event,
            } => merge::end_event(self.group_mut(group), event_id, *request, event.as_ref()),
            Action::FetchEventFail {
                group,
                event_id,
                request,
            } => merge::fail_event(self.group_mut(group), event_id, *request),
            Action::EventsUpdate { group, events } => {
                applied.invalidated = merge::update_events(self.group_mut(group), events, version);
            }
            Action::EditEvents { group, edit } => {
                let group = self.group_mut(group);
                applied.mutated = apply_edit(group, edit, version);
                applied.invalidated = applied
                    .mutated
                    .iter()
                    .filter_map(|id| group.entity(id))
                    .map(|event| event.span())
                    .collect();
            }
            Action::InvalidatePeriod { group, period } => {
                let days = invalidate_period(self.group_mut(group), period, version);
                applied.invalidated = vec![days];
            }
            Action::ResetGroup { group } => {
                self.reset_group(group, version);
            }
        }

        tracing::trace!(
            action = action.name(),
            group = %action.group(),
            version,
            mutated = applied.mutated.len(),
            invalidated = applied.invalidated.len(),
            "Applied cache action"
        );
        applied
    }
}

/// Returns the state after `action`, leaving `state` untouched.
pub fn next_state(state: &CacheState, action: &Action) -> CacheState {
    let mut next = state.clone();
    next.apply(action);
    next
}
