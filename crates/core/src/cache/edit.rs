//! Local event edits and the label push they produce.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::invalidate::invalidate_days;
use super::state::GroupCache;
use crate::event::{
    normalize_label_key, EventEntity, EventId, LabelKey, LabelPush, LabelUpdate, RecurringId,
    TimebombState,
};

/// What an edit does to each targeted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventChange {
    AddLabels(BTreeSet<LabelKey>),
    RemoveLabels(BTreeSet<LabelKey>),
    SetLabels(BTreeSet<LabelKey>),
    /// Hides the event and clears its labels.
    Hide,
    Unhide,
    ConfirmLabels,
    SetTimebomb(Option<TimebombState>),
    /// Makes a detached instance follow its recurring series again.
    Reattach,
}

impl EventChange {
    pub fn add_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::AddLabels(normalized(labels))
    }

    pub fn remove_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::RemoveLabels(normalized(labels))
    }

    pub fn set_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::SetLabels(normalized(labels))
    }

    /// Applies the change to one event. Passive edits leave the
    /// confirmation flags alone.
    pub fn apply_to(&self, event: &mut EventEntity, passive: bool) {
        match self {
            EventChange::AddLabels(labels) => {
                event
                    .labels
                    .extend(labels.iter().map(|label| normalize_label_key(label)));
                confirm(event, passive);
            }
            EventChange::RemoveLabels(labels) => {
                for label in labels {
                    event.labels.remove(&normalize_label_key(label));
                }
                confirm(event, passive);
            }
            EventChange::SetLabels(labels) => {
                event.labels = labels
                    .iter()
                    .map(|label| normalize_label_key(label))
                    .collect();
                confirm(event, passive);
            }
            EventChange::Hide => {
                event.hidden = true;
                event.labels.clear();
            }
            EventChange::Unhide => event.hidden = false,
            EventChange::ConfirmLabels => confirm(event, false),
            EventChange::SetTimebomb(state) => event.timebomb = *state,
            EventChange::Reattach => {}
        }
    }
}

fn normalized<I, S>(labels: I) -> BTreeSet<LabelKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|label| normalize_label_key(label.as_ref()))
        .collect()
}

fn confirm(event: &mut EventEntity, passive: bool) {
    if !passive {
        event.labels_confirmed = true;
        event.labels_predicted = false;
    }
}

/// A local edit targeting events directly and/or whole recurring series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEdit {
    #[serde(default)]
    pub event_ids: Vec<EventId>,
    #[serde(default)]
    pub recurring_event_ids: Vec<RecurringId>,
    pub change: EventChange,
    /// Set for confirmations triggered by viewing rather than by the user.
    #[serde(default)]
    pub passive: bool,
}

impl EventEdit {
    pub fn events<I>(ids: I, change: EventChange) -> Self
    where
        I: IntoIterator,
        I::Item: Into<EventId>,
    {
        Self {
            event_ids: ids.into_iter().map(Into::into).collect(),
            recurring_event_ids: Vec::new(),
            change,
            passive: false,
        }
    }

    pub fn recurring<I>(ids: I, change: EventChange) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RecurringId>,
    {
        Self {
            event_ids: Vec::new(),
            recurring_event_ids: ids.into_iter().map(Into::into).collect(),
            change,
            passive: false,
        }
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }
}

/// Applies `edit` to the group's entities and invalidates every day the
/// mutated events touch. Returns the ids of the mutated events.
pub(crate) fn apply_edit(group: &mut GroupCache, edit: &EventEdit, version: u64) -> Vec<EventId> {
    let direct: HashSet<&EventId> = edit.event_ids.iter().collect();
    let mut mutated: Vec<Arc<EventEntity>> = Vec::new();

    for id in group.recurring().expand(&edit.recurring_event_ids) {
        if direct.contains(&id) {
            continue;
        }
        let Some(current) = group.entity(&id) else {
            continue;
        };
        if !current.uses_recurring_labels() {
            tracing::trace!(event_id = %id, "Skipping detached recurring instance");
            continue;
        }
        let mut next = EventEntity::clone(current);
        edit.change.apply_to(&mut next, edit.passive);
        next.has_recurring_labels = Some(true);
        mutated.push(group.upsert_entity(next));
    }

    for id in &edit.event_ids {
        let Some(current) = group.entity(id) else {
            tracing::debug!(event_id = %id, "Edit targets an unknown event");
            continue;
        };
        let mut next = EventEntity::clone(current);
        edit.change.apply_to(&mut next, edit.passive);
        if next.recurring_event_id.is_some() {
            next.has_recurring_labels = Some(edit.change == EventChange::Reattach);
        }
        mutated.push(group.upsert_entity(next));
    }

    for event in &mutated {
        invalidate_days(group, &event.span(), version);
    }
    mutated.iter().map(|event| event.id.clone()).collect()
}

/// Builds the label write for events already edited in `group`.
pub fn label_push(group: &GroupCache, event_ids: &[EventId]) -> LabelPush {
    let mut seen = HashSet::new();
    let mut push = LabelPush::default();
    for event in event_ids.iter().filter_map(|id| group.entity(id)) {
        if !seen.insert(&event.id) {
            continue;
        }
        push.set_labels.push(LabelUpdate {
            event_id: event.id.clone(),
            labels: event.labels.clone(),
            hidden: event.hidden,
            labels_confirmed: event.labels_confirmed,
            recurring: event.has_recurring_labels == Some(true),
            timebomb: event.timebomb,
        });
        if !event.hidden && event.labels.is_empty() && !event.labels_confirmed {
            push.predict_labels.push(event.id.clone());
        }
    }
    push
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::merge::end_query;
    use crate::cache::state::{FetchState, MergePolicy};
    use crate::period::{day_offset, DayOffset, Period};
    use crate::query::{query_key, QueryFilter};
    use chrono::{NaiveDate, NaiveDateTime, Utc};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn oct(day: u32) -> DayOffset {
        day_offset(NaiveDate::from_ymd_opt(2024, 10, day).unwrap())
    }

    fn loaded(events: &[EventEntity]) -> GroupCache {
        let mut group = GroupCache::default();
        let filter = QueryFilter::new();
        end_query(
            &mut group,
            &Period::days(oct(1), oct(7)),
            &query_key(&filter),
            &filter,
            1,
            events,
            Utc::now(),
            MergePolicy::AcceptLate,
        );
        group
    }

    fn series() -> GroupCache {
        loaded(&[
            EventEntity::new("e4", at(1, 9), at(1, 10))
                .with_labels(["standup"])
                .with_recurring("R"),
            EventEntity::new("e5", at(2, 9), at(2, 10))
                .with_labels(["standup"])
                .with_recurring("R"),
        ])
    }

    fn labels(group: &GroupCache, id: &str) -> Vec<String> {
        group
            .entity(&id.into())
            .map(|event| event.labels.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_recurring_edit_updates_every_instance() {
        let mut group = series();
        let edit = EventEdit::recurring(["R"], EventChange::add_labels(["Focus"]));

        let mutated = apply_edit(&mut group, &edit, 2);

        assert_eq!(mutated.len(), 2);
        assert_eq!(labels(&group, "e4"), vec!["focus", "standup"]);
        assert_eq!(labels(&group, "e5"), vec!["focus", "standup"]);
    }

    #[test]
    fn test_direct_edit_detaches_instance() {
        let mut group = series();
        let edit = EventEdit::events(["e4"], EventChange::add_labels(["focus"]));

        let mutated = apply_edit(&mut group, &edit, 2);

        assert_eq!(mutated, vec![EventId::new("e4")]);
        assert_eq!(labels(&group, "e5"), vec!["standup"]);
        let e4 = group.entity(&"e4".into()).unwrap();
        assert_eq!(e4.has_recurring_labels, Some(false));

        let edit = EventEdit::recurring(["R"], EventChange::remove_labels(["standup"]));
        apply_edit(&mut group, &edit, 3);
        assert_eq!(labels(&group, "e4"), vec!["focus", "standup"]);
        assert!(labels(&group, "e5").is_empty());
    }

    #[test]
    fn test_reattach_restores_recurring_edits() {
        let mut group = series();
        apply_edit(
            &mut group,
            &EventEdit::events(["e4"], EventChange::add_labels(["focus"])),
            2,
        );
        let reattach = EventEdit::events(["e4"], EventChange::Reattach);
        apply_edit(&mut group, &reattach, 3);

        assert_eq!(
            group.entity(&"e4".into()).unwrap().has_recurring_labels,
            Some(true)
        );
        apply_edit(
            &mut group,
            &EventEdit::recurring(["R"], EventChange::set_labels(["review"])),
            4,
        );
        assert_eq!(labels(&group, "e4"), vec!["review"]);
    }

    #[test]
    fn test_hide_clears_labels() {
        let mut group = series();
        apply_edit(&mut group, &EventEdit::events(["e5"], EventChange::Hide), 2);

        let e5 = group.entity(&"e5".into()).unwrap();
        assert!(e5.hidden);
        assert!(e5.labels.is_empty());
    }

    #[test]
    fn test_passive_edit_keeps_confirmation_flags() {
        let mut group = loaded(&[
            EventEntity::new("e1", at(1, 9), at(1, 10)).with_predicted_labels(["focus"])
        ]);

        apply_edit(
            &mut group,
            &EventEdit::events(["e1"], EventChange::add_labels(["deep"])).passive(),
            2,
        );
        let e1 = group.entity(&"e1".into()).unwrap();
        assert!(e1.labels_predicted);
        assert!(!e1.labels_confirmed);

        apply_edit(
            &mut group,
            &EventEdit::events(["e1"], EventChange::add_labels(["deep"])),
            3,
        );
        let e1 = group.entity(&"e1".into()).unwrap();
        assert!(!e1.labels_predicted);
        assert!(e1.labels_confirmed);
    }

    #[test]
    fn test_edit_invalidates_touched_days_only() {
        let mut group = series();
        let key = query_key(&QueryFilter::new());
        apply_edit(
            &mut group,
            &EventEdit::events(["e5"], EventChange::ConfirmLabels),
            2,
        );

        let invalid = |day| {
            group
                .entry(day, &key)
                .and_then(FetchState::as_result)
                .map(|result| result.invalid)
        };
        assert_eq!(invalid(oct(1)), Some(false));
        assert_eq!(invalid(oct(2)), Some(true));
    }

    #[test]
    fn test_label_push_describes_edited_events() {
        let mut group = series();
        let mutated = apply_edit(
            &mut group,
            &EventEdit::recurring(["R"], EventChange::set_labels(Vec::<&str>::new())),
            2,
        );

        let push = label_push(&group, &mutated);
        assert_eq!(push.set_labels.len(), 2);
        assert!(push.set_labels.iter().all(|update| update.recurring));
        assert!(push.predict_labels.is_empty());

        let mut group = loaded(&[EventEntity::new("e1", at(1, 9), at(1, 10)).hidden()]);
        let unhide = EventEdit::events(["e1"], EventChange::Unhide);
        let mutated = apply_edit(&mut group, &unhide, 2);
        let push = label_push(&group, &mutated);
        assert_eq!(push.predict_labels, vec![EventId::new("e1")]);
    }

    #[test]
    fn test_edit_change_wire_format() {
        let edit = EventEdit::events(["e1"], EventChange::add_labels(["Focus"]));
        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["change"]["type"], "add_labels");
        assert_eq!(json["change"]["value"][0], "focus");

        let parsed: EventEdit =
            serde_json::from_str(r#"{"event_ids": ["e1"], "change": {"type": "hide"}}"#).unwrap();
        assert_eq!(parsed.change, EventChange::Hide);
        assert!(!parsed.passive);
    }
}
