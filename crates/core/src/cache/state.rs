//! Day-bucketed cache state.
//!
//! Layout: calendar group -> day offset -> query key -> fetch state, plus a
//! per-group entity map and recurring index. Every level sits behind an
//! `Arc`, so cloning a `CacheState` is cheap and writers copy only the
//! group, day bucket or map they touch (`Arc::make_mut`).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::event::{CalendarGroupId, EventEntity, EventId, RecurringId};
use crate::period::{DayOffset, Period};
use crate::query::{QueryFilter, QueryKey};

/// Identifies one fetch; equal to the store version at which it started.
pub type RequestId = u64;

/// Fetch states of every cached query for one day.
pub type DayBucket = HashMap<QueryKey, FetchState>;

/// A loaded list of event ids for one (day, query).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query: QueryFilter,
    /// Ids in first-seen order, without duplicates.
    pub event_ids: Vec<EventId>,
    pub updated_on: DateTime<Utc>,
    /// Set by local edits; the list stays readable until replaced.
    pub invalid: bool,
    /// A refetch of this entry is in flight.
    pub refreshing: Option<RequestId>,
}

impl QueryResult {
    /// Returns true if the result is older than `stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Option<Duration>) -> bool {
        stale_after.is_some_and(|ttl| now.signed_duration_since(self.updated_on) > ttl)
    }
}

/// Fetch state of one (day, query) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Fetching { request: RequestId },
    FetchError,
    Result(QueryResult),
}

impl FetchState {
    pub fn as_result(&self) -> Option<&QueryResult> {
        match self {
            FetchState::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FetchState::Result(_))
    }
}

/// Fetch state of one entity in the entity map.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Fetching { request: RequestId },
    FetchError,
    Entity(Arc<EventEntity>),
}

impl EntityState {
    pub fn entity(&self) -> Option<&Arc<EventEntity>> {
        match self {
            EntityState::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Every instance seen so far for each recurring series.
///
/// Append-only: edits never remove membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurringIndex {
    members: HashMap<RecurringId, BTreeSet<EventId>>,
}

impl RecurringIndex {
    /// Adds an instance; returns true if it was not known yet.
    pub fn insert(&mut self, recurring_id: RecurringId, event_id: EventId) -> bool {
        self.members
            .entry(recurring_id)
            .or_default()
            .insert(event_id)
    }

    pub fn members(&self, recurring_id: &RecurringId) -> impl Iterator<Item = &EventId> {
        self.members.get(recurring_id).into_iter().flatten()
    }

    /// Concrete instance ids of the given series, without duplicates.
    pub fn expand(&self, recurring_ids: &[RecurringId]) -> Vec<EventId> {
        let mut seen = BTreeSet::new();
        recurring_ids
            .iter()
            .flat_map(|rid| self.members(rid))
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Number of known series.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Everything cached for one calendar group.
#[derive(Debug, Clone, Default)]
pub struct GroupCache {
    queries: BTreeMap<DayOffset, Arc<DayBucket>>,
    entities: Arc<HashMap<EventId, EntityState>>,
    recurring: Arc<RecurringIndex>,
    /// Store version of the latest invalidation per day.
    invalidated_at: BTreeMap<DayOffset, u64>,
}

impl GroupCache {
    pub fn bucket(&self, day: DayOffset) -> Option<&DayBucket> {
        self.queries.get(&day).map(Arc::as_ref)
    }

    pub fn entry(&self, day: DayOffset, key: &QueryKey) -> Option<&FetchState> {
        self.bucket(day).and_then(|bucket| bucket.get(key))
    }

    /// Day offsets holding at least one bucket, ascending.
    pub fn days(&self) -> impl Iterator<Item = DayOffset> + '_ {
        self.queries.keys().copied()
    }

    /// Days inside `days` that hold a bucket, ascending.
    pub fn days_within(&self, days: &Period) -> impl Iterator<Item = DayOffset> + '_ {
        let range = (days.start <= days.end).then(|| self.queries.range(days.start..=days.end));
        range.into_iter().flatten().map(|(day, _)| *day)
    }

    pub fn entity_state(&self, id: &EventId) -> Option<&EntityState> {
        self.entities.get(id)
    }

    /// Loaded entity for an id or any of its duplicate ids.
    pub fn entity(&self, id: &EventId) -> Option<&Arc<EventEntity>> {
        self.entity_state(id).and_then(EntityState::entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn recurring(&self) -> &RecurringIndex {
        &self.recurring
    }

    pub fn invalidated_at(&self, day: DayOffset) -> Option<u64> {
        self.invalidated_at.get(&day).copied()
    }

    pub(crate) fn bucket_mut(&mut self, day: DayOffset) -> &mut DayBucket {
        Arc::make_mut(self.queries.entry(day).or_default())
    }

    pub(crate) fn entities_mut(&mut self) -> &mut HashMap<EventId, EntityState> {
        Arc::make_mut(&mut self.entities)
    }

    pub(crate) fn mark_invalidated(&mut self, day: DayOffset, version: u64) {
        self.invalidated_at.insert(day, version);
    }

    /// Stores an event under its id and every duplicate id, and records
    /// its recurring membership.
    pub(crate) fn upsert_entity(&mut self, event: EventEntity) -> Arc<EventEntity> {
        let event = Arc::new(event);
        let entities = self.entities_mut();
        entities.insert(event.id.clone(), EntityState::Entity(Arc::clone(&event)));
        for duplicate in &event.duplicates {
            entities.insert(duplicate.clone(), EntityState::Entity(Arc::clone(&event)));
        }
        if let Some(recurring_id) = &event.recurring_event_id {
            Arc::make_mut(&mut self.recurring).insert(recurring_id.clone(), event.id.clone());
        }
        event
    }
}

/// How a response merge treats days invalidated after it was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Late responses overwrite the day as fresh.
    #[default]
    AcceptLate,
    /// Late responses are merged but stay flagged invalid.
    RejectStale,
}

/// The whole cache: a versioned snapshot of every calendar group.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    version: u64,
    policy: MergePolicy,
    groups: HashMap<CalendarGroupId, Arc<GroupCache>>,
    /// Version of the latest reset per group.
    resets: HashMap<CalendarGroupId, u64>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Number of actions applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version the next applied action will produce; used to stamp fetches.
    pub fn next_version(&self) -> u64 {
        self.version + 1
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn group(&self, id: &CalendarGroupId) -> Option<&GroupCache> {
        self.groups.get(id).map(Arc::as_ref)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = &CalendarGroupId> {
        self.groups.keys()
    }

    pub(crate) fn group_mut(&mut self, id: &CalendarGroupId) -> &mut GroupCache {
        Arc::make_mut(self.groups.entry(id.clone()).or_default())
    }

    /// Returns true if `request` started before the group's latest reset.
    pub fn is_superseded(&self, id: &CalendarGroupId, request: RequestId) -> bool {
        self.resets.get(id).is_some_and(|reset| request < *reset)
    }

    pub(crate) fn reset_group(&mut self, id: &CalendarGroupId, version: u64) -> bool {
        self.resets.insert(id.clone(), version);
        self.groups.remove(id).is_some()
    }

    pub(crate) fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}
