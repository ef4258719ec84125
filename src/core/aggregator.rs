//! Merging of partial shard payloads into canonical series
//!
//! Both merges are deterministic functions of their input: the result does
//! not depend on the order payloads arrive in, and running a merge twice on
//! the same input yields identical output.

use std::collections::BTreeMap;

use crate::core::types::{
    HourlyPayload, HourlyPoint, HourlySeries, MonthlyPayload, MonthlyPoint, MonthlySeries,
};

/// Merge hourly payloads (consumes payloads to avoid cloning)
///
/// Points for each hour are concatenated across payloads, then ordered by
/// views descending. Ties keep their order within the originating payload;
/// ties across payloads fall back to rank position and then label, so any
/// permutation of `payloads` produces the same series. Hours absent from
/// every payload are absent from the result.
pub(crate) fn merge_hourly(payloads: Vec<HourlyPayload>) -> HourlySeries {
    let mut hours: BTreeMap<u8, Vec<(usize, HourlyPoint)>> = BTreeMap::new();

    for payload in payloads {
        for (hour, points) in payload.0 {
            hours
                .entry(hour)
                .or_default()
                .extend(points.into_iter().enumerate());
        }
    }

    let hours = hours
        .into_iter()
        .map(|(hour, mut ranked)| {
            ranked.sort_by(|(rank_a, a), (rank_b, b)| {
                b.y.cmp(&a.y)
                    .then(rank_a.cmp(rank_b))
                    .then_with(|| a.x.total_cmp(&b.x))
            });
            (hour, ranked.into_iter().map(|(_, point)| point).collect())
        })
        .collect();

    HourlySeries { hours }
}

/// Merge monthly payloads by summing views per day identifier
///
/// Duplicate `x` values inside one payload are summed the same way as
/// duplicates across payloads. The series is ordered by `x` as a string,
/// which is chronological for zero-padded identifiers.
pub(crate) fn merge_monthly(payloads: Vec<MonthlyPayload>) -> MonthlySeries {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();

    for payload in payloads {
        for point in payload {
            let total = totals.entry(point.x).or_insert(0);
            *total = total.saturating_add(point.y);
        }
    }

    MonthlySeries {
        points: totals
            .into_iter()
            .map(|(x, y)| MonthlyPoint { x, y })
            .collect(),
    }
}
