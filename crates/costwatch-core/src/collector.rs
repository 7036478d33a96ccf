//! Collector - one snapshot per cycle, tolerant of partial failure
//!
//! Runs every enabled provider adapter for a trailing window and assembles a
//! [`Snapshot`]. One adapter's failure never suppresses another's results;
//! the collector itself never fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::CollectorConfig;
use crate::error::ProviderError;
use crate::models::{Provider, Snapshot, TimeRange};
use crate::providers::CostProvider;

/// Outcome of one adapter fetch, for the registry's counters and histogram
#[derive(Debug, Clone)]
pub struct FetchRecord {
    /// Which provider was fetched
    pub provider: Provider,
    /// How long the fetch took (or how long it was allowed to run)
    pub duration: Duration,
    /// Whether the fetch produced entries
    pub ok: bool,
}

/// One collection cycle's output
#[derive(Debug, Clone)]
pub struct Collection {
    /// The assembled snapshot
    pub snapshot: Snapshot,
    /// Per-adapter fetch outcomes
    pub fetches: Vec<FetchRecord>,
}

/// Fans out to all enabled adapters and assembles snapshots
pub struct Collector {
    providers: Vec<Arc<dyn CostProvider>>,
    window: Duration,
    provider_timeout: Duration,
    cycle_timeout: Duration,
    max_concurrent: usize,
}

impl Collector {
    /// Create a collector over the given adapters
    pub fn new(providers: Vec<Arc<dyn CostProvider>>, config: &CollectorConfig) -> Self {
        Self {
            providers,
            window: config.window,
            provider_timeout: config.provider_timeout,
            cycle_timeout: config.cycle_timeout,
            max_concurrent: config.max_concurrent_fetches.max(1),
        }
    }

    /// Number of configured adapters
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Run one collection cycle
    ///
    /// Adapters run concurrently, bounded by the configured limit and by a
    /// per-adapter timeout. A whole-cycle deadline cancels any still-pending
    /// fetches; whatever completed is kept. Always returns a snapshot, even
    /// when every adapter fails.
    pub async fn run(&self) -> Collection {
        let window = TimeRange::trailing(self.window);
        let deadline = tokio::time::Instant::now() + self.cycle_timeout;
        let provider_timeout = self.provider_timeout;

        // Collect the futures eagerly so the mapping closure's type never
        // appears inside the stream; otherwise spawning `Scheduler::run`
        // hits rustc's "implementation of `FnOnce` is not general enough"
        // limitation (rust-lang/rust#89976).
        let fetches: Vec<_> = self
            .providers
            .iter()
            .cloned()
            .map(|adapter| {
                let window = window.clone();
                async move {
                    let started = std::time::Instant::now();
                    let result = match tokio::time::timeout(
                        provider_timeout,
                        adapter.fetch(&window),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::timeout(
                            adapter.provider(),
                            format!("no response within {provider_timeout:?}"),
                        )),
                    };
                    (adapter.provider(), started.elapsed(), result)
                }
                .boxed()
            })
            .collect();
        let mut pending = stream::iter(fetches).buffer_unordered(self.max_concurrent);

        let mut entries = Vec::new();
        let mut provider_errors = BTreeMap::new();
        let mut fetches = Vec::new();
        let mut completed: BTreeSet<Provider> = BTreeSet::new();

        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((provider, duration, result))) => {
                    completed.insert(provider.clone());
                    match result {
                        Ok(mut batch) => {
                            info!(
                                provider = %provider,
                                entries = batch.len(),
                                duration_ms = duration.as_millis() as u64,
                                "provider fetch succeeded"
                            );
                            entries.append(&mut batch);
                            fetches.push(FetchRecord {
                                provider,
                                duration,
                                ok: true,
                            });
                        }
                        Err(err) => {
                            warn!(provider = %provider, error = %err, "provider fetch failed");
                            provider_errors.insert(provider.clone(), err.to_string());
                            fetches.push(FetchRecord {
                                provider,
                                duration,
                                ok: false,
                            });
                        }
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("collection cycle deadline exceeded; keeping partial results");
                    break;
                }
            }
        }
        // Dropping the stream cancels any fetches still in flight.
        drop(pending);

        for adapter in &self.providers {
            let provider = adapter.provider();
            if !completed.contains(&provider) {
                let err =
                    ProviderError::timeout(provider.clone(), "collection cycle deadline exceeded");
                provider_errors.insert(provider.clone(), err.to_string());
                fetches.push(FetchRecord {
                    provider,
                    duration: self.cycle_timeout,
                    ok: false,
                });
            }
        }

        let snapshot = Snapshot {
            entries,
            window,
            collected_at: Utc::now(),
            provider_errors,
        };

        Collection { snapshot, fetches }
    }
}
