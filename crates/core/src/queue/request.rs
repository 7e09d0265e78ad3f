use std::cmp::Reverse;

use crate::event::{CalendarGroupId, LabelPush};
use crate::period::Period;
use crate::query::QueryFilter;

/// A read: make `period` readable for `query`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub group: CalendarGroupId,
    pub period: Period,
    pub query: QueryFilter,
    /// Higher runs first.
    pub priority: i32,
    /// Per-request override of the store's chunk size.
    pub max_days_fetch: Option<usize>,
}

impl FetchRequest {
    pub fn new(group: impl Into<CalendarGroupId>, period: Period, query: QueryFilter) -> Self {
        Self {
            group: group.into(),
            period,
            query,
            priority: 0,
            max_days_fetch: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_days_fetch(mut self, max_days: usize) -> Self {
        self.max_days_fetch = Some(max_days);
        self
    }
}

/// Work queued for one calendar group.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingRequest {
    Fetch(FetchRequest),
    LabelPush(LabelPush),
}

impl PendingRequest {
    pub fn is_write(&self) -> bool {
        matches!(self, PendingRequest::LabelPush(_))
    }

    fn priority(&self) -> i32 {
        match self {
            PendingRequest::Fetch(fetch) => fetch.priority,
            PendingRequest::LabelPush(_) => 0,
        }
    }
}

/// A queued request with its arrival number and reply slot.
#[derive(Debug)]
pub struct Queued<T> {
    pub seq: u64,
    pub request: PendingRequest,
    pub reply: T,
}

/// Arrival-ordered queue of pending requests for one calendar group.
#[derive(Debug)]
pub struct RequestQueue<T> {
    next_seq: u64,
    items: Vec<Queued<T>>,
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            items: Vec::new(),
        }
    }
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a request and returns its arrival number.
    pub fn push(&mut self, request: PendingRequest, reply: T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.push(Queued {
            seq,
            request,
            reply,
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Takes everything queued, in processing order: label pushes first in
    /// arrival order, then fetches by descending priority, ties by arrival.
    pub fn drain(&mut self) -> Vec<Queued<T>> {
        let mut items = std::mem::take(&mut self.items);
        items.sort_by_key(|item| {
            (
                !item.request.is_write(),
                Reverse(item.request.priority()),
                item.seq,
            )
        });
        items
    }
}
