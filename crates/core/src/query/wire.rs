//! Expansion of a filter into the events API request shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::normalize::reduce;
use super::types::{LabelSelection, QueryFilter};
use crate::period::{bounds, Period, PeriodError};

/// A predicate clause understood by the events API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Clause {
    And { clauses: Vec<Clause> },
    Or { clauses: Vec<Clause> },
    Not { clause: Box<Clause> },
    HasLabel { label: String },
    Unlabeled,
    Contains { text: String },
    Participant { emails: Vec<String> },
    MinCost { value: f64 },
}

/// Body of a bulk events request: an inclusive date range plus a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Clause>,
}

impl WireRequest {
    /// Builds the request for every day of `period`.
    pub fn for_period(period: &Period, filter: &QueryFilter) -> Result<Self, PeriodError> {
        let span = bounds(period)?;
        Ok(to_api(span.start, span.end, filter))
    }
}

/// Expands a filter into the wire request for `start..=end`.
pub fn to_api(start: NaiveDate, end: NaiveDate, filter: &QueryFilter) -> WireRequest {
    let filter = reduce(filter);
    let mut clauses = Vec::new();

    if let Some(clause) = filter.labels.as_ref().and_then(label_clause) {
        clauses.push(clause);
    }
    if let Some(text) = filter.contains {
        clauses.push(Clause::Contains { text });
    }
    if let Some(emails) = filter.participant {
        clauses.push(Clause::Participant { emails });
    }
    if let Some(value) = filter.min_cost {
        clauses.push(Clause::MinCost { value });
    }

    let filter = match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Clause::And { clauses }),
    };
    WireRequest { start, end, filter }
}

fn label_clause(selection: &LabelSelection) -> Option<Clause> {
    match (selection.selects_all(), selection.selects_unlabeled()) {
        (true, true) => None,
        (true, false) => Some(Clause::Not {
            clause: Box::new(Clause::Unlabeled),
        }),
        (false, unlabeled) => {
            let mut clauses: Vec<Clause> = selection
                .some
                .iter()
                .filter(|(_, selected)| **selected)
                .map(|(label, _)| Clause::HasLabel {
                    label: label.clone(),
                })
                .collect();
            if unlabeled {
                clauses.push(Clause::Unlabeled);
            }
            Some(Clause::Or { clauses })
        }
    }
}
