//! Snapshot analysis
//!
//! Pure aggregation over a [`Snapshot`]: totals, per-provider and per-service
//! groupings, daily averages and a month-length-aware projection. No I/O and
//! no floating point; all sums are exact [`Decimal`] arithmetic.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use rust_decimal::Decimal;

use crate::models::{Analysis, Snapshot};

const SECONDS_PER_DAY: i64 = 86_400;

/// Aggregate one snapshot into an [`Analysis`]
///
/// An empty snapshot yields an analysis with zero totals and empty groupings.
/// The result depends only on the multiset of entries, never on their order.
pub fn analyze(snapshot: &Snapshot) -> Analysis {
    let mut analysis = Analysis::empty();
    analysis.timestamp = snapshot.collected_at;

    let last_day_start = snapshot.window.end - ChronoDuration::seconds(SECONDS_PER_DAY);

    for entry in &snapshot.entries {
        analysis.total_cost += entry.cost;
        *analysis
            .by_provider
            .entry(entry.provider.clone())
            .or_default() += entry.cost;
        *analysis.by_service.entry(entry.service.clone()).or_default() += entry.cost;

        if entry.timestamp >= last_day_start {
            analysis.last_day_total += entry.cost;
        }
    }

    // Windows shorter than a day still project as at least one day's worth,
    // so a brief window never inflates the monthly figure.
    let window_days = window_days(snapshot).max(Decimal::ONE);
    let month_days = Decimal::from(days_in_month(snapshot));

    for (provider, total) in &analysis.by_provider {
        let daily = total / window_days;
        analysis.daily_by_provider.insert(provider.clone(), daily);
        analysis
            .monthly_projection
            .insert(provider.clone(), daily * month_days);
    }

    analysis
}

fn window_days(snapshot: &Snapshot) -> Decimal {
    let seconds = snapshot.window.duration().num_seconds().max(0);
    Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY)
}

/// Days in the month the snapshot was collected in
fn days_in_month(snapshot: &Snapshot) -> u32 {
    let date = snapshot.collected_at.date_naive();
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    match (
        NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next_first)) => (next_first - first).num_days() as u32,
        _ => 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CostEntry, Provider, TimeRange};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn snapshot_with(entries: Vec<CostEntry>) -> Snapshot {
        let mut snapshot = Snapshot::empty(TimeRange::trailing(Duration::from_secs(86_400)));
        snapshot.entries = entries;
        snapshot
    }

    #[test]
    fn empty_snapshot_yields_zero_analysis() {
        let analysis = analyze(&snapshot_with(vec![]));
        assert_eq!(analysis.total_cost, Decimal::ZERO);
        assert!(analysis.by_provider.is_empty());
        assert!(analysis.by_service.is_empty());
        assert!(analysis.monthly_projection.is_empty());
    }

    #[test]
    fn groups_by_provider_and_service() {
        let analysis = analyze(&snapshot_with(vec![
            CostEntry::new(Provider::Aws, "ec2", dec!(500)),
            CostEntry::new(Provider::Aws, "s3", dec!(100)),
            CostEntry::new(Provider::Azure, "vm", dec!(200)),
        ]));

        assert_eq!(analysis.total_cost, dec!(800));
        assert_eq!(analysis.by_provider[&Provider::Aws], dec!(600));
        assert_eq!(analysis.by_provider[&Provider::Azure], dec!(200));
        assert_eq!(analysis.by_service["ec2"], dec!(500));
        assert_eq!(analysis.by_service["s3"], dec!(100));
        assert_eq!(analysis.by_service["vm"], dec!(200));
    }

    #[test]
    fn same_service_name_across_providers_shares_one_group() {
        let analysis = analyze(&snapshot_with(vec![
            CostEntry::new(Provider::Aws, "storage", dec!(10)),
            CostEntry::new(Provider::Gcp, "storage", dec!(15)),
        ]));
        assert_eq!(analysis.by_service["storage"], dec!(25));
        assert_eq!(analysis.by_service.len(), 1);
    }

    #[test]
    fn last_day_total_only_counts_final_24h() {
        let end = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).unwrap();
        let window = TimeRange {
            start: end - ChronoDuration::days(7),
            end,
        };
        let mut old = CostEntry::new(Provider::Aws, "ec2", dec!(700));
        old.timestamp = end - ChronoDuration::days(3);
        let mut recent = CostEntry::new(Provider::Aws, "ec2", dec!(120));
        recent.timestamp = end - ChronoDuration::hours(6);

        let mut snapshot = Snapshot::empty(window);
        snapshot.entries = vec![old, recent];

        let analysis = analyze(&snapshot);
        assert_eq!(analysis.total_cost, dec!(820));
        assert_eq!(analysis.last_day_total, dec!(120));
    }

    #[test]
    fn projection_scales_daily_average_by_month_length() {
        // 7-day window collected in February 2026 (28 days).
        let end = Utc.with_ymd_and_hms(2026, 2, 15, 0, 0, 0).unwrap();
        let window = TimeRange {
            start: end - ChronoDuration::days(7),
            end,
        };
        let mut snapshot = Snapshot::empty(window);
        snapshot.collected_at = end;
        snapshot.entries = vec![CostEntry::new(Provider::Aws, "ec2", dec!(70))];

        let analysis = analyze(&snapshot);
        assert_eq!(analysis.daily_by_provider[&Provider::Aws], dec!(10));
        assert_eq!(analysis.monthly_projection[&Provider::Aws], dec!(280));
    }

    #[test]
    fn sub_day_window_projects_as_one_day() {
        let end = Utc.with_ymd_and_hms(2026, 4, 10, 12, 0, 0).unwrap();
        let window = TimeRange {
            start: end - ChronoDuration::hours(1),
            end,
        };
        let mut snapshot = Snapshot::empty(window);
        snapshot.collected_at = end;
        snapshot.entries = vec![CostEntry::new(Provider::Gcp, "compute", dec!(5))];

        let analysis = analyze(&snapshot);
        // April has 30 days; the hour-long window counts as one full day.
        assert_eq!(analysis.daily_by_provider[&Provider::Gcp], dec!(5));
        assert_eq!(analysis.monthly_projection[&Provider::Gcp], dec!(150));
    }

    proptest! {
        #[test]
        fn entry_order_never_changes_the_result(
            costs in proptest::collection::vec(0u64..10_000, 0..20),
            seed in any::<u64>(),
        ) {
            let providers = [Provider::Aws, Provider::Azure, Provider::Gcp];
            let entries: Vec<CostEntry> = costs
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    CostEntry::new(
                        providers[i % providers.len()].clone(),
                        format!("svc-{}", i % 4),
                        Decimal::from(*c),
                    )
                })
                .collect();

            let mut shuffled = entries.clone();
            // Deterministic Fisher-Yates driven by the seed.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            let a = analyze(&snapshot_with(entries));
            let b = analyze(&snapshot_with(shuffled));
            prop_assert_eq!(a.total_cost, b.total_cost);
            prop_assert_eq!(a.by_provider, b.by_provider);
            prop_assert_eq!(a.by_service, b.by_service);
        }
    }
}
