//! # Costwatch
//!
//! Multi-cloud cost telemetry: collects billing data from cloud provider
//! APIs, aggregates it, evaluates spend thresholds, and exposes the result
//! as prometheus metrics and alert notifications.
//!
//! ## Architecture
//!
//! - **Providers**: adapters normalizing each billing API into cost entries
//! - **Collector**: bounded concurrent fan-out, one snapshot per cycle
//! - **Analyzer**: pure aggregation (totals, groupings, projection)
//! - **Alerting**: threshold evaluation plus Slack/email dispatch
//! - **Registry**: atomically published cycles, prometheus exposition
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the collection loop and HTTP server
//! costwatch serve
//!
//! # One collection cycle, report to stdout
//! costwatch run
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod analyzer;
pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod registry;
pub mod scheduler;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{evaluate, AlertDispatcher};
    pub use crate::analyzer::analyze;
    pub use crate::collector::Collector;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::registry::MetricsRegistry;
    pub use crate::scheduler::Scheduler;
}
