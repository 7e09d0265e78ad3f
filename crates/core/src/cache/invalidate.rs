//! Marking cached day lists invalid.

use super::state::{FetchState, GroupCache};
use crate::period::{to_days, DayOffset, Period};

/// Flags every cached result on `days` as invalid, for all query keys, and
/// records `version` as the latest invalidation of each loaded day.
///
/// Lists are kept so they can still be rendered until replaced. Days
/// without a bucket are skipped, so the cost follows what is cached rather
/// than the length of the span.
pub(crate) fn invalidate_days(group: &mut GroupCache, days: &Period, version: u64) {
    let loaded: Vec<DayOffset> = group.days_within(days).collect();
    for day in loaded {
        group.mark_invalidated(day, version);
        let has_valid = group.bucket(day).is_some_and(|bucket| {
            bucket
                .values()
                .filter_map(FetchState::as_result)
                .any(|result| !result.invalid)
        });
        if !has_valid {
            continue;
        }
        for state in group.bucket_mut(day).values_mut() {
            if let FetchState::Result(result) = state {
                result.invalid = true;
            }
        }
    }
}

/// Invalidates `period`, first widening it so events crossing either
/// boundary are invalidated on every day they touch.
///
/// Returns the day range that was actually invalidated.
pub(crate) fn invalidate_period(group: &mut GroupCache, period: &Period, version: u64) -> Period {
    let days = widen(group, &to_days(period));
    invalidate_days(group, &days, version);
    days
}

fn widen(group: &GroupCache, days: &Period) -> Period {
    let start = boundary_spans(group, days.start)
        .map(|span| span.start)
        .min()
        .map_or(days.start, |start| start.min(days.start));
    let end = boundary_spans(group, days.end)
        .map(|span| span.end)
        .max()
        .map_or(days.end, |end| end.max(days.end));
    Period::days(start, end)
}

/// Spans of every event listed on `day`, across all query keys.
fn boundary_spans(group: &GroupCache, day: DayOffset) -> impl Iterator<Item = Period> + '_ {
    group
        .bucket(day)
        .into_iter()
        .flat_map(|bucket| bucket.values())
        .filter_map(FetchState::as_result)
        .flat_map(|result| result.event_ids.iter())
        .filter_map(move |id| group.entity(id))
        .map(|event| event.span())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::merge::end_query;
    use crate::cache::state::MergePolicy;
    use crate::event::EventEntity;
    use crate::period::{day_offset, index_of_day, Interval};
    use crate::query::{query_key, LabelSelection, QueryFilter, QueryKey};
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

    fn load(group: &mut GroupCache, filter: &QueryFilter, days: Period, events: &[EventEntity]) {
        end_query(
            group,
            &days,
            &query_key(filter),
            filter,
            1,
            events,
            Utc::now(),
            MergePolicy::AcceptLate,
        );
    }

    fn is_invalid(group: &GroupCache, day: DayOffset, key: &QueryKey) -> bool {
        group
            .entry(day, key)
            .and_then(FetchState::as_result)
            .is_some_and(|result| result.invalid)
    }

    #[test]
    fn test_invalidate_days_covers_all_keys() {
        let mut group = GroupCache::default();
        let everything = QueryFilter::new();
        let labeled = QueryFilter::new().with_labels(LabelSelection::labeled());
        load(&mut group, &everything, Period::days(oct(1), oct(2)), &[]);
        load(&mut group, &labeled, Period::days(oct(1), oct(2)), &[]);

        invalidate_days(&mut group, &Period::days(oct(2), oct(2)), 4);

        assert!(!is_invalid(&group, oct(1), &query_key(&everything)));
        assert!(is_invalid(&group, oct(2), &query_key(&everything)));
        assert!(is_invalid(&group, oct(2), &query_key(&labeled)));
        assert_eq!(group.invalidated_at(oct(2)), Some(4));
        assert_eq!(group.invalidated_at(oct(1)), None);
    }

    #[test]
    fn test_invalidate_days_only_stamps_loaded_days() {
        let mut group = GroupCache::default();
        let filter = QueryFilter::new();
        load(&mut group, &filter, Period::days(oct(3), oct(3)), &[]);

        invalidate_days(&mut group, &Period::days(i64::MIN / 2, i64::MAX / 2), 7);

        assert!(is_invalid(&group, oct(3), &query_key(&filter)));
        assert_eq!(group.invalidated_at(oct(3)), Some(7));
        assert_eq!(group.invalidated_at(oct(2)), None);
        assert_eq!(group.invalidated_at(oct(4)), None);
        assert_eq!(group.days().collect::<Vec<_>>(), vec![oct(3)]);
    }

    #[test]
    fn test_invalidate_period_widens_to_boundary_events() {
        let mut group = GroupCache::default();
        let filter = QueryFilter::new();
        let key = query_key(&filter);
        let events = [
            EventEntity::new("early", at(1, 20), at(2, 9)),
            EventEntity::new("late", at(4, 20), at(5, 9)),
        ];
        load(&mut group, &filter, Period::days(oct(1), oct(5)), &events);

        let invalidated = invalidate_period(&mut group, &Period::days(oct(2), oct(4)), 2);

        assert_eq!(invalidated, Period::days(oct(1), oct(5)));
        for day in oct(1)..=oct(5) {
            assert!(is_invalid(&group, day, &key), "day {day}");
        }
    }

    #[test]
    fn test_invalidate_period_accepts_coarse_intervals() {
        let mut group = GroupCache::default();
        let week = Period::single(Interval::Week, index_of_day(oct(2), Interval::Week));

        let invalidated = invalidate_period(&mut group, &week, 1);

        assert_eq!(invalidated, to_days(&week));
        assert!(invalidated.contains(oct(2)));
    }
}
