//! Alert rule and triggered alert data models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which analysis figure a rule compares its threshold against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertPeriod {
    /// Compare against the most recent day's total
    #[default]
    Daily,
    /// Compare against the full collection window's total
    Weekly,
    /// Compare against the projected monthly total
    Monthly,
}

/// A configured cost threshold rule
///
/// Rules are loaded once at startup and are immutable for the process
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Human-readable name
    pub name: String,

    /// Threshold the comparable figure must exceed to fire
    pub threshold: Decimal,

    /// Which figure to compare against
    #[serde(default)]
    pub period: AlertPeriod,

    /// Channel identifiers to notify (e.g., "slack", "email")
    #[serde(default)]
    pub notification_channels: Vec<String>,

    /// Disabled rules are dropped at load
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A rule breach produced by one evaluation cycle
///
/// Transient: handed to the notifiers and the metrics registry, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredAlert {
    /// Name of the rule that fired
    pub rule: String,

    /// The rule's period
    pub period: AlertPeriod,

    /// Configured threshold
    pub threshold: Decimal,

    /// The figure that breached the threshold
    pub actual: Decimal,

    /// `actual - threshold`
    pub overage: Decimal,

    /// Overage as a percentage of the threshold; 0 when the threshold is 0
    pub overage_pct: Decimal,

    /// Channels this alert should be dispatched to
    pub channels: Vec<String>,

    /// When the evaluation fired
    pub triggered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rule_deserializes_with_defaults() {
        let rule: AlertRule =
            serde_json::from_str(r#"{"name": "daily_cost_high", "threshold": 100}"#).unwrap();
        assert_eq!(rule.period, AlertPeriod::Daily);
        assert!(rule.enabled);
        assert!(rule.notification_channels.is_empty());
        assert_eq!(rule.threshold, dec!(100));
    }

    #[test]
    fn period_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&AlertPeriod::Monthly).unwrap(),
            "\"monthly\""
        );
        let period: AlertPeriod = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(period, AlertPeriod::Weekly);
    }
}
