use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which labels a query selects.
///
/// `all` selects every labeled event, `none` selects unlabeled events and
/// `some` picks individual labels. Absent means "not selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub none: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub some: BTreeMap<String, bool>,
}

impl LabelSelection {
    /// Every event, labeled or not.
    pub fn everything() -> Self {
        Self {
            all: Some(true),
            none: Some(true),
            some: BTreeMap::new(),
        }
    }

    /// Every labeled event.
    pub fn labeled() -> Self {
        Self {
            all: Some(true),
            ..Self::default()
        }
    }

    /// Only events without labels.
    pub fn unlabeled() -> Self {
        Self {
            none: Some(true),
            ..Self::default()
        }
    }

    /// Events carrying any of the given labels.
    pub fn some<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            some: labels.into_iter().map(|l| (l.into(), true)).collect(),
            ..Self::default()
        }
    }

    /// Also selects unlabeled events.
    pub fn with_unlabeled(mut self) -> Self {
        self.none = Some(true);
        self
    }

    pub fn selects_all(&self) -> bool {
        self.all == Some(true)
    }

    pub fn selects_unlabeled(&self) -> bool {
        self.none == Some(true)
    }
}

/// A user-selectable predicate over events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelSelection>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::serde::deserialize_optional_string"
    )]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cost: Option<f64>,
}

impl QueryFilter {
    /// A filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(mut self, labels: LabelSelection) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_contains(mut self, text: impl Into<String>) -> Self {
        self.contains = Some(text.into());
        self
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participant = Some(participants.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_min_cost(mut self, cost: f64) -> Self {
        self.min_cost = Some(cost);
        self
    }
}

/// Stable string key of a normalized filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
