//! Aggregated analysis of a snapshot

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cost::Provider;

/// Derived, read-only aggregate view over one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Exact sum of all entry costs in the window
    pub total_cost: Decimal,

    /// Cost grouped by provider; empty groups are absent
    pub by_provider: BTreeMap<Provider, Decimal>,

    /// Cost grouped by service; empty groups are absent
    pub by_service: BTreeMap<String, Decimal>,

    /// Per-day average cost per provider over the window
    pub daily_by_provider: BTreeMap<Provider, Decimal>,

    /// Exact sum of entries falling in the final 24h of the window
    pub last_day_total: Decimal,

    /// Projected full-month cost per provider
    pub monthly_projection: BTreeMap<Provider, Decimal>,

    /// When the underlying snapshot was collected
    pub timestamp: DateTime<Utc>,
}

impl Analysis {
    /// An analysis with no data, timestamped now
    ///
    /// Used to seed the metrics registry before the first cycle completes.
    pub fn empty() -> Self {
        Self {
            total_cost: Decimal::ZERO,
            by_provider: BTreeMap::new(),
            by_service: BTreeMap::new(),
            daily_by_provider: BTreeMap::new(),
            last_day_total: Decimal::ZERO,
            monthly_projection: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Projected full-month cost summed across providers
    pub fn projected_monthly_total(&self) -> Decimal {
        self.monthly_projection.values().copied().sum()
    }
}
