//! Published-cycle registry and prometheus exposition
//!
//! The scheduler publishes each cycle's analysis and triggered alerts as one
//! atomic [`ArcSwap`] store; scrape handlers load the current cycle without
//! blocking the writer, so a scrape never observes values from two different
//! cycles. Monotonic fetch/alert counters live in a persistent prometheus
//! registry; cost gauges are rendered on demand from the loaded cycle.

use std::sync::Arc;

use arc_swap::ArcSwap;
use prometheus::{
    Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::collector::FetchRecord;
use crate::error::Result;
use crate::models::{Analysis, TriggeredAlert};

/// One cycle's publishable output, swapped as a unit
#[derive(Debug, Clone)]
pub struct PublishedCycle {
    /// The cycle's analysis
    pub analysis: Analysis,
    /// Alerts that fired this cycle
    pub alerts: Vec<TriggeredAlert>,
}

impl PublishedCycle {
    /// A well-formed cycle with no data, used before the first collection
    pub fn empty() -> Self {
        Self {
            analysis: Analysis::empty(),
            alerts: Vec::new(),
        }
    }
}

/// Shared state between the scheduler (writer) and the HTTP server (readers)
pub struct MetricsRegistry {
    published: ArcSwap<PublishedCycle>,
    persistent: Registry,
    fetch_total: IntCounterVec,
    fetch_duration: HistogramVec,
    alerts_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Create a registry seeded with an empty published cycle
    pub fn new() -> Result<Self> {
        let persistent = Registry::new();

        let fetch_total = IntCounterVec::new(
            Opts::new("cost_fetch_total", "Provider fetch attempts by outcome"),
            &["provider", "status"],
        )?;
        persistent.register(Box::new(fetch_total.clone()))?;

        let fetch_duration = HistogramVec::new(
            HistogramOpts::new(
                "cost_fetch_duration_seconds",
                "Provider fetch duration in seconds",
            ),
            &["provider"],
        )?;
        persistent.register(Box::new(fetch_duration.clone()))?;

        let alerts_total = IntCounterVec::new(
            Opts::new("cost_alerts_triggered_total", "Alert rule firings"),
            &["rule"],
        )?;
        persistent.register(Box::new(alerts_total.clone()))?;

        Ok(Self {
            published: ArcSwap::from_pointee(PublishedCycle::empty()),
            persistent,
            fetch_total,
            fetch_duration,
            alerts_total,
        })
    }

    /// Atomically replace the published cycle
    pub fn publish(&self, analysis: Analysis, alerts: Vec<TriggeredAlert>) {
        self.published
            .store(Arc::new(PublishedCycle { analysis, alerts }));
    }

    /// The currently published cycle
    pub fn current(&self) -> Arc<PublishedCycle> {
        self.published.load_full()
    }

    /// Count one adapter fetch and observe its duration
    pub fn record_fetch(&self, record: &FetchRecord) {
        let status = if record.ok { "success" } else { "failure" };
        self.fetch_total
            .with_label_values(&[record.provider.as_str(), status])
            .inc();
        self.fetch_duration
            .with_label_values(&[record.provider.as_str()])
            .observe(record.duration.as_secs_f64());
    }

    /// Count one alert firing
    pub fn record_alert(&self, alert: &TriggeredAlert) {
        self.alerts_total.with_label_values(&[&alert.rule]).inc();
    }

    /// Render the full exposition: gauges from the current cycle, then the
    /// persistent counters and histogram
    pub fn render(&self) -> Result<String> {
        let cycle = self.published.load_full();
        let gauges = Registry::new();

        let by_provider = GaugeVec::new(
            Opts::new("cloud_cost_total", "Cost in the collection window by provider"),
            &["provider"],
        )?;
        gauges.register(Box::new(by_provider.clone()))?;
        for (provider, cost) in &cycle.analysis.by_provider {
            by_provider
                .with_label_values(&[provider.as_str()])
                .set(as_f64(*cost));
        }

        let by_service = GaugeVec::new(
            Opts::new("cloud_cost_service", "Cost in the collection window by service"),
            &["service"],
        )?;
        gauges.register(Box::new(by_service.clone()))?;
        for (service, cost) in &cycle.analysis.by_service {
            by_service.with_label_values(&[service]).set(as_f64(*cost));
        }

        let daily = GaugeVec::new(
            Opts::new("cloud_cost_daily", "Per-day average cost by provider"),
            &["provider"],
        )?;
        gauges.register(Box::new(daily.clone()))?;
        for (provider, cost) in &cycle.analysis.daily_by_provider {
            daily
                .with_label_values(&[provider.as_str()])
                .set(as_f64(*cost));
        }

        let projection = GaugeVec::new(
            Opts::new(
                "cloud_cost_monthly_projection",
                "Projected full-month cost by provider",
            ),
            &["provider"],
        )?;
        gauges.register(Box::new(projection.clone()))?;
        for (provider, cost) in &cycle.analysis.monthly_projection {
            projection
                .with_label_values(&[provider.as_str()])
                .set(as_f64(*cost));
        }

        let total = Gauge::new("cloud_cost_sum", "Total cost in the collection window")?;
        gauges.register(Box::new(total.clone()))?;
        total.set(as_f64(cycle.analysis.total_cost));

        let alert_active = GaugeVec::new(
            Opts::new("cost_alert_active", "Alert rules that fired last cycle"),
            &["rule"],
        )?;
        gauges.register(Box::new(alert_active.clone()))?;
        for alert in &cycle.alerts {
            alert_active.with_label_values(&[&alert.rule]).set(1.0);
        }

        let collected_at = Gauge::new(
            "cloud_cost_last_collection_timestamp_seconds",
            "Unix time of the last published collection",
        )?;
        gauges.register(Box::new(collected_at.clone()))?;
        collected_at.set(cycle.analysis.timestamp.timestamp() as f64);

        let encoder = TextEncoder::new();
        let mut out = String::new();
        encoder.encode_utf8(&gauges.gather(), &mut out)?;
        encoder.encode_utf8(&self.persistent.gather(), &mut out)?;
        Ok(out)
    }
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertPeriod, Provider};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn analysis() -> Analysis {
        let mut analysis = Analysis::empty();
        analysis.total_cost = dec!(800);
        analysis.by_provider.insert(Provider::Aws, dec!(600));
        analysis.by_provider.insert(Provider::Azure, dec!(200));
        analysis.by_service.insert("ec2".to_string(), dec!(500));
        analysis.daily_by_provider.insert(Provider::Aws, dec!(600));
        analysis
            .monthly_projection
            .insert(Provider::Aws, dec!(18600));
        analysis
    }

    fn triggered() -> TriggeredAlert {
        TriggeredAlert {
            rule: "daily_cost_high".to_string(),
            period: AlertPeriod::Daily,
            threshold: dec!(700),
            actual: dec!(800),
            overage: dec!(100),
            overage_pct: dec!(14.29),
            channels: vec![],
            triggered_at: Utc::now(),
        }
    }

    #[test]
    fn empty_registry_renders_without_cost_gauges() {
        let registry = MetricsRegistry::new().unwrap();
        let text = registry.render().unwrap();
        assert!(!text.contains("cloud_cost_total{"));
        assert!(!text.contains("cost_alert_active{"));
        assert!(text.contains("cloud_cost_sum 0"));
    }

    #[test]
    fn published_cycle_appears_in_exposition() {
        let registry = MetricsRegistry::new().unwrap();
        registry.publish(analysis(), vec![triggered()]);

        let text = registry.render().unwrap();
        assert!(text.contains("cloud_cost_total{provider=\"aws\"} 600"));
        assert!(text.contains("cloud_cost_total{provider=\"azure\"} 200"));
        assert!(text.contains("cloud_cost_service{service=\"ec2\"} 500"));
        assert!(text.contains("cloud_cost_monthly_projection{provider=\"aws\"} 18600"));
        assert!(text.contains("cloud_cost_sum 800"));
        assert!(text.contains("cost_alert_active{rule=\"daily_cost_high\"} 1"));
    }

    #[test]
    fn publish_replaces_the_previous_cycle() {
        let registry = MetricsRegistry::new().unwrap();
        registry.publish(analysis(), vec![triggered()]);
        registry.publish(Analysis::empty(), vec![]);

        let text = registry.render().unwrap();
        assert!(!text.contains("cost_alert_active{"));
        assert!(text.contains("cloud_cost_sum 0"));
    }

    #[test]
    fn fetch_counters_accumulate_across_cycles() {
        let registry = MetricsRegistry::new().unwrap();
        let ok = FetchRecord {
            provider: Provider::Aws,
            duration: Duration::from_millis(120),
            ok: true,
        };
        let failed = FetchRecord {
            provider: Provider::Aws,
            duration: Duration::from_millis(80),
            ok: false,
        };
        registry.record_fetch(&ok);
        registry.record_fetch(&ok);
        registry.record_fetch(&failed);

        let text = registry.render().unwrap();
        assert!(text.contains("cost_fetch_total{provider=\"aws\",status=\"success\"} 2"));
        assert!(text.contains("cost_fetch_total{provider=\"aws\",status=\"failure\"} 1"));
        assert!(text.contains("cost_fetch_duration_seconds_count{provider=\"aws\"} 3"));
    }

    #[test]
    fn alert_counter_counts_firings() {
        let registry = MetricsRegistry::new().unwrap();
        registry.record_alert(&triggered());
        registry.record_alert(&triggered());

        let text = registry.render().unwrap();
        assert!(text.contains("cost_alerts_triggered_total{rule=\"daily_cost_high\"} 2"));
    }
}
