use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::{EventId, RecurringId};
use crate::period::{from_dates, Period};

/// A label name as used in filters and on events.
pub type LabelKey = String;

/// Canonical form of a label key: trimmed, inner whitespace collapsed,
/// lowercase.
pub fn normalize_label_key(key: &str) -> LabelKey {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// State of an event's timebomb (scheduled automatic removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimebombState {
    Armed,
    Defused,
    Detonated,
}

/// An event as returned by the events API and held in the entity map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntity {
    pub id: EventId,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "crate::serde::deserialize_event_time")]
    pub start: NaiveDateTime,
    #[serde(deserialize_with = "crate::serde::deserialize_event_time")]
    pub end: NaiveDateTime,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub labels: BTreeSet<LabelKey>,
    #[serde(default)]
    pub labels_confirmed: bool,
    #[serde(default)]
    pub labels_predicted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<RecurringId>,
    /// `Some(true)` while this instance follows its series' labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_recurring_labels: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timebomb: Option<TimebombState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Other ids under which the API knows this same event.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<EventId>,
}

impl EventEntity {
    /// Creates an unlabeled, visible event.
    pub fn new(id: impl Into<EventId>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            start,
            end,
            hidden: false,
            labels: BTreeSet::new(),
            labels_confirmed: false,
            labels_predicted: false,
            recurring_event_id: None,
            has_recurring_labels: None,
            timebomb: None,
            participants: Vec::new(),
            cost: None,
            duplicates: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets confirmed labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.labels = labels
            .into_iter()
            .map(|l| normalize_label_key(l.as_ref()))
            .collect();
        self.labels_confirmed = true;
        self
    }

    /// Sets machine-predicted, unconfirmed labels.
    pub fn with_predicted_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self = self.with_labels(labels);
        self.labels_confirmed = false;
        self.labels_predicted = true;
        self
    }

    /// Marks this event as an instance of a recurring series following
    /// the series labels.
    pub fn with_recurring(mut self, recurring_id: impl Into<RecurringId>) -> Self {
        self.recurring_event_id = Some(recurring_id.into());
        self.has_recurring_labels = Some(true);
        self
    }

    pub fn with_duplicate(mut self, id: impl Into<EventId>) -> Self {
        self.duplicates.push(id.into());
        self
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Days this event touches.
    pub fn span(&self) -> Period {
        from_dates(self.start, self.end)
    }

    /// Returns true if recurring-wide edits still apply to this instance:
    /// it follows its series, has no labels yet, or only carries
    /// predicted labels.
    pub fn uses_recurring_labels(&self) -> bool {
        self.has_recurring_labels == Some(true)
            || self.labels.is_empty()
            || (self.labels_predicted && !self.labels_confirmed)
    }
}

/// Label state pushed to the API for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelUpdate {
    pub event_id: EventId,
    pub labels: BTreeSet<LabelKey>,
    pub hidden: bool,
    pub labels_confirmed: bool,
    /// True when the update came through the recurring series.
    pub recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timebomb: Option<TimebombState>,
}

/// A batch of label writes for one calendar group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPush {
    pub set_labels: Vec<LabelUpdate>,
    /// Events the API should run label prediction for again.
    pub predict_labels: Vec<EventId>,
}

impl LabelPush {
    pub fn is_empty(&self) -> bool {
        self.set_labels.is_empty() && self.predict_labels.is_empty()
    }
}
