use std::collections::HashMap;

use crate::cache::RequestId;
use crate::event::CalendarGroupId;
use crate::period::Period;
use crate::query::QueryKey;

/// One outstanding network fetch.
#[derive(Debug, Clone)]
pub struct InFlight<H> {
    pub request: RequestId,
    pub days: Period,
    pub handle: H,
}

/// Outstanding fetches per (calendar group, query key), used to attach new
/// requests to fetches that already cover their days.
#[derive(Debug)]
pub struct InFlightIndex<H> {
    entries: HashMap<(CalendarGroupId, QueryKey), Vec<InFlight<H>>>,
}

impl<H> Default for InFlightIndex<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<H> InFlightIndex<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        group: &CalendarGroupId,
        key: &QueryKey,
        request: RequestId,
        days: Period,
        handle: H,
    ) {
        self.entries
            .entry((group.clone(), key.clone()))
            .or_default()
            .push(InFlight {
                request,
                days,
                handle,
            });
    }

    /// Fetches for the same group and key whose days overlap `days`.
    pub fn overlapping<'a>(
        &'a self,
        group: &CalendarGroupId,
        key: &QueryKey,
        days: &'a Period,
    ) -> impl Iterator<Item = &'a InFlight<H>> + 'a {
        self.entries
            .get(&(group.clone(), key.clone()))
            .into_iter()
            .flatten()
            .filter(move |entry| entry.days.overlaps(days))
    }

    /// Forgets a finished fetch and returns its handle.
    pub fn remove(
        &mut self,
        group: &CalendarGroupId,
        key: &QueryKey,
        request: RequestId,
    ) -> Option<H> {
        let map_key = (group.clone(), key.clone());
        let entries = self.entries.get_mut(&map_key)?;
        let position = entries.iter().position(|entry| entry.request == request)?;
        let removed = entries.swap_remove(position);
        if entries.is_empty() {
            self.entries.remove(&map_key);
        }
        Some(removed.handle)
    }

    /// Drops every outstanding fetch of a group.
    pub fn clear_group(&mut self, group: &CalendarGroupId) {
        self.entries
            .retain(|(entry_group, _), _| entry_group != group);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
