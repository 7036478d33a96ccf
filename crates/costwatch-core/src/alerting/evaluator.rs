//! Threshold evaluation
//!
//! Pure comparison of alert rules against one analysis. Producing a
//! [`TriggeredAlert`] has no side effects; dispatching it is the notifier's
//! job.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::models::{AlertPeriod, AlertRule, Analysis, TriggeredAlert};

/// Evaluate every rule against the analysis, in rule order
///
/// A rule fires when its figure strictly exceeds the threshold; equal-to
/// never fires. Disabled rules are skipped.
pub fn evaluate(rules: &[AlertRule], analysis: &Analysis) -> Vec<TriggeredAlert> {
    let now = Utc::now();
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter_map(|rule| {
            let actual = comparable_figure(rule.period, analysis);
            if actual <= rule.threshold {
                return None;
            }

            let overage = actual - rule.threshold;
            let overage_pct = if rule.threshold.is_zero() {
                Decimal::ZERO
            } else {
                (overage / rule.threshold * Decimal::ONE_HUNDRED).round_dp(2)
            };

            Some(TriggeredAlert {
                rule: rule.name.clone(),
                period: rule.period,
                threshold: rule.threshold,
                actual,
                overage,
                overage_pct,
                channels: rule.notification_channels.clone(),
                triggered_at: now,
            })
        })
        .collect()
}

fn comparable_figure(period: AlertPeriod, analysis: &Analysis) -> Decimal {
    match period {
        AlertPeriod::Daily => analysis.last_day_total,
        AlertPeriod::Weekly => analysis.total_cost,
        AlertPeriod::Monthly => analysis.projected_monthly_total(),
    }
}
