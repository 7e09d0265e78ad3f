//! Canonical form and cache key of query filters.

use std::collections::BTreeMap;

use super::types::{LabelSelection, QueryFilter, QueryKey};
use crate::event::normalize_label_key;

/// Costs at or below this floor do not filter anything.
const MIN_COST_FLOOR: f64 = 1.0;

/// Removes every field equal to its default, producing a minimal filter.
///
/// Label keys are trimmed and lowercased, participants are trimmed, sorted
/// and deduplicated. The result is a fixed point: `reduce(reduce(f)) ==
/// reduce(f)`.
pub fn reduce(filter: &QueryFilter) -> QueryFilter {
    QueryFilter {
        labels: filter.labels.as_ref().and_then(reduce_labels),
        contains: filter
            .contains
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        participant: filter.participant.as_ref().and_then(|participants| {
            let mut participants: Vec<String> = participants
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            participants.sort();
            participants.dedup();
            (!participants.is_empty()).then_some(participants)
        }),
        min_cost: filter
            .min_cost
            .filter(|cost| cost.is_finite() && *cost > MIN_COST_FLOOR),
    }
}

/// `None` means every event is selected.
fn reduce_labels(selection: &LabelSelection) -> Option<LabelSelection> {
    let all = selection.selects_all();
    let none = selection.selects_unlabeled();
    if all && none {
        return None;
    }

    // Individual labels are implied once every labeled event is selected.
    let some: BTreeMap<String, bool> = if all {
        BTreeMap::new()
    } else {
        selection
            .some
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(label, _)| normalize_label_key(label))
            .filter(|label| !label.is_empty())
            .map(|label| (label, true))
            .collect()
    };

    Some(LabelSelection {
        all: all.then_some(true),
        none: none.then_some(true),
        some,
    })
}

/// Stable key of a filter; equal for filters that reduce to the same form.
pub fn stringify(filter: &QueryFilter) -> QueryKey {
    // Field order is fixed and every map is a BTreeMap, so the JSON text is
    // canonical. Serializing these plain structs cannot fail.
    QueryKey::new(serde_json::to_string(&reduce(filter)).unwrap_or_default())
}

/// Alias of [`stringify`] used where the key addresses a day bucket.
pub fn query_key(filter: &QueryFilter) -> QueryKey {
    stringify(filter)
}
