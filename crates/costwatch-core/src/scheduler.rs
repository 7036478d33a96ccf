//! Periodic collection loop
//!
//! One background task drives the pipeline: collect, analyze, evaluate,
//! publish. Cycles run back to back on a fixed interval and never overlap;
//! a cycle that outruns the interval delays the next tick instead of
//! stacking. Notification dispatch is spawned off the loop so a slow
//! channel never delays the next cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::alerting::{evaluate, AlertDispatcher};
use crate::analyzer::analyze;
use crate::collector::Collector;
use crate::config::SchedulerConfig;
use crate::models::{AlertRule, TriggeredAlert};
use crate::registry::{MetricsRegistry, PublishedCycle};

/// Drives collection cycles on a fixed interval
pub struct Scheduler {
    collector: Collector,
    rules: Vec<AlertRule>,
    dispatcher: Arc<AlertDispatcher>,
    registry: Arc<MetricsRegistry>,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler over the given pipeline pieces
    pub fn new(
        collector: Collector,
        rules: Vec<AlertRule>,
        dispatcher: Arc<AlertDispatcher>,
        registry: Arc<MetricsRegistry>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            collector,
            rules,
            dispatcher,
            registry,
            interval: config.interval,
        }
    }

    /// Run the loop until the task is dropped
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            providers = self.collector.provider_count(),
            rules = self.rules.len(),
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let alerts = self.run_cycle().await;
            if !alerts.is_empty() {
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::spawn(async move {
                    dispatcher.dispatch(&alerts).await;
                });
            }
        }
    }

    /// Run one collection cycle and publish its results
    ///
    /// Returns the alerts that fired; the caller decides how to dispatch
    /// them.
    pub async fn run_cycle(&self) -> Vec<TriggeredAlert> {
        let collection = self.collector.run().await;
        let analysis = analyze(&collection.snapshot);
        let alerts = evaluate(&self.rules, &analysis);

        info!(
            entries = collection.snapshot.entries.len(),
            total = %analysis.total_cost,
            failed_providers = collection.snapshot.provider_errors.len(),
            alerts = alerts.len(),
            "collection cycle complete"
        );

        self.registry.publish(analysis, alerts.clone());
        for record in &collection.fetches {
            self.registry.record_fetch(record);
        }
        for alert in &alerts {
            self.registry.record_alert(alert);
        }

        alerts
    }

    /// Run a single cycle with inline dispatch, for the one-shot CLI path
    pub async fn run_once(&self) -> Arc<PublishedCycle> {
        let alerts = self.run_cycle().await;
        if !alerts.is_empty() {
            self.dispatcher.dispatch(&alerts).await;
        }
        self.registry.current()
    }
}
