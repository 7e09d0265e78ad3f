//! Deciding which day ranges still have to be fetched.

use chrono::{DateTime, Duration, Utc};

use super::state::{CacheState, FetchState, GroupCache};
use crate::event::CalendarGroupId;
use crate::period::{to_days, DayOffset, Period};
use crate::query::{query_key, QueryFilter, QueryKey};

/// Cache status of one (day, query) entry as seen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    Missing,
    /// A fetch (or refresh) is in flight.
    Fetching,
    Failed,
    Stale,
    Invalid,
    Fresh,
}

impl DayStatus {
    pub fn needs_fetch(self) -> bool {
        matches!(
            self,
            DayStatus::Missing | DayStatus::Failed | DayStatus::Stale | DayStatus::Invalid
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Results older than this are refetched. `None` never expires.
    pub stale_after: Option<Duration>,
    /// Upper bound on the days covered by one request.
    pub max_days_fetch: Option<usize>,
}

/// Day ranges to request, ascending and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    pub ranges: Vec<Period>,
}

impl FetchPlan {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn total_days(&self) -> i64 {
        self.ranges.iter().map(Period::len).sum()
    }
}

pub fn day_status(
    group: Option<&GroupCache>,
    day: DayOffset,
    key: &QueryKey,
    now: DateTime<Utc>,
    stale_after: Option<Duration>,
) -> DayStatus {
    match group.and_then(|group| group.entry(day, key)) {
        None => DayStatus::Missing,
        Some(FetchState::Fetching { .. }) => DayStatus::Fetching,
        Some(FetchState::FetchError) => DayStatus::Failed,
        Some(FetchState::Result(result)) if result.refreshing.is_some() => DayStatus::Fetching,
        Some(FetchState::Result(result)) if result.invalid => DayStatus::Invalid,
        Some(FetchState::Result(result)) if result.is_stale(now, stale_after) => DayStatus::Stale,
        Some(FetchState::Result(_)) => DayStatus::Fresh,
    }
}

/// Plans the requests needed to make `period` readable for `filter`.
///
/// Days that are missing, failed, stale or invalid are grouped into
/// contiguous ranges; days already being fetched are never requested again.
pub fn plan_fetch(
    state: &CacheState,
    group_id: &CalendarGroupId,
    period: &Period,
    filter: &QueryFilter,
    now: DateTime<Utc>,
    options: PlanOptions,
) -> FetchPlan {
    let group = state.group(group_id);
    let key = query_key(filter);
    let days = to_days(period);

    let mut ranges: Vec<Period> = Vec::new();
    let mut open: Option<Period> = None;
    for day in days.indices() {
        let status = day_status(group, day, &key, now, options.stale_after);
        if status.needs_fetch() {
            open = Some(match open {
                Some(range) => Period::days(range.start, day),
                None => Period::days(day, day),
            });
        } else if let Some(range) = open.take() {
            ranges.push(range);
        }
    }
    ranges.extend(open);

    if let Some(max_days) = options.max_days_fetch.filter(|max| *max > 0) {
        ranges = ranges
            .into_iter()
            .flat_map(|range| chunk(range, max_days))
            .collect();
    }

    tracing::trace!(
        group = %group_id,
        %key,
        days = %days,
        ranges = ranges.len(),
        "Planned fetch"
    );
    FetchPlan { ranges }
}

fn chunk(range: Period, max_days: usize) -> impl Iterator<Item = Period> {
    let extra_days = i64::try_from(max_days).unwrap_or(i64::MAX) - 1;
    (range.start..=range.end)
        .step_by(max_days)
        .map(move |start| {
            let end = start.saturating_add(extra_days).min(range.end);
            Period::days(start, end)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::actions::{next_state, Action};
    use crate::event::EventEntity;
    use crate::period::{Interval, Period};

    fn group() -> CalendarGroupId {
        CalendarGroupId::new("g")
    }

    fn loaded(period: Period, filter: &QueryFilter, received_at: DateTime<Utc>) -> CacheState {
        next_state(
            &CacheState::new(),
            &Action::FetchQueryEnd {
                group: group(),
                period,
                query: filter.clone(),
                request: 1,
                events: Vec::<EventEntity>::new(),
                received_at,
            },
        )
    }

    #[test]
    fn test_plan_everything_when_empty() {
        let period = Period::new(Interval::Week, 100, 101).unwrap();
        let plan = plan_fetch(
            &CacheState::new(),
            &group(),
            &period,
            &QueryFilter::new(),
            Utc::now(),
            PlanOptions::default(),
        );
        assert_eq!(plan.ranges, vec![to_days(&period)]);
        assert_eq!(plan.total_days(), 14);
    }

    #[test]
    fn test_plan_reports_invalid_day_inside_clean_range() {
        let filter = QueryFilter::new();
        let period = Period::new(Interval::Week, 100, 101).unwrap();
        let days = to_days(&period);
        let state = loaded(period, &filter, Utc::now());
        let state = next_state(
            &state,
            &Action::InvalidatePeriod {
                group: group(),
                period: Period::days(days.start + 1, days.start + 1),
            },
        );

        let plan = plan_fetch(
            &state,
            &group(),
            &period,
            &filter,
            Utc::now(),
            PlanOptions::default(),
        );

        let middle = Period::days(days.start + 1, days.start + 1);
        assert_eq!(plan.ranges, vec![middle]);
    }

    #[test]
    fn test_plan_skips_days_in_flight() {
        let filter = QueryFilter::new();
        let state = next_state(
            &CacheState::new(),
            &Action::FetchQueryStart {
                group: group(),
                period: Period::days(3, 4),
                query: filter.clone(),
                request: 1,
            },
        );

        let plan = plan_fetch(
            &state,
            &group(),
            &Period::days(1, 6),
            &filter,
            Utc::now(),
            PlanOptions::default(),
        );
        assert_eq!(plan.ranges, vec![Period::days(1, 2), Period::days(5, 6)]);
    }

    #[test]
    fn test_plan_refetches_failed_and_stale_days() {
        let filter = QueryFilter::new();
        let now = Utc::now();
        let state = loaded(Period::days(1, 2), &filter, now - Duration::minutes(10));
        let state = next_state(
            &state,
            &Action::FetchQueryFail {
                group: group(),
                period: Period::days(3, 3),
                query: filter.clone(),
                request: 5,
            },
        );

        let fresh_enough = PlanOptions {
            stale_after: Some(Duration::minutes(30)),
            ..PlanOptions::default()
        };
        let days = Period::days(1, 3);
        let plan = plan_fetch(&state, &group(), &days, &filter, now, fresh_enough);
        assert_eq!(plan.ranges, vec![Period::days(3, 3)]);

        let expired = PlanOptions {
            stale_after: Some(Duration::minutes(5)),
            ..PlanOptions::default()
        };
        let plan = plan_fetch(&state, &group(), &days, &filter, now, expired);
        assert_eq!(plan.ranges, vec![Period::days(1, 3)]);
    }

    #[test]
    fn test_plan_with_huge_chunk_size_keeps_range() {
        for max_days in [usize::MAX, i64::MAX as usize, 8] {
            let options = PlanOptions {
                max_days_fetch: Some(max_days),
                ..PlanOptions::default()
            };
            let plan = plan_fetch(
                &CacheState::new(),
                &group(),
                &Period::days(10, 17),
                &QueryFilter::new(),
                Utc::now(),
                options,
            );
            assert_eq!(
                plan.ranges,
                vec![Period::days(10, 17)],
                "max_days {max_days}"
            );
        }
    }

    #[test]
    fn test_plan_chunks_by_max_days() {
        let options = PlanOptions {
            max_days_fetch: Some(3),
            ..PlanOptions::default()
        };
        let plan = plan_fetch(
            &CacheState::new(),
            &group(),
            &Period::days(0, 7),
            &QueryFilter::new(),
            Utc::now(),
            options,
        );
        assert_eq!(
            plan.ranges,
            vec![Period::days(0, 2), Period::days(3, 5), Period::days(6, 7)]
        );
    }

    #[test]
    fn test_plan_is_keyed_by_normalized_filter() {
        let blank = QueryFilter::new().with_contains(" ");
        let state = loaded(Period::days(1, 1), &blank, Utc::now());
        let plan = plan_fetch(
            &state,
            &group(),
            &Period::days(1, 1),
            &QueryFilter::new(),
            Utc::now(),
            PlanOptions::default(),
        );
        assert!(plan.is_empty());
    }
}
