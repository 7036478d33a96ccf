//! Costwatch CLI
//!
//! Command-line interface for the costwatch cost telemetry service.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use costwatch::alerting::AlertDispatcher;
use costwatch::api::HttpServer;
use costwatch::collector::Collector;
use costwatch::models::{Analysis, TriggeredAlert};
use costwatch::providers::{self, EnvCredentialStore};
use costwatch::registry::MetricsRegistry;
use costwatch::scheduler::Scheduler;
use costwatch::Config;

/// Costwatch - multi-cloud cost telemetry
#[derive(Parser)]
#[command(name = "costwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "COSTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the collection loop and the HTTP server
    Serve {
        /// HTTP port for the exposition endpoint and JSON API
        #[arg(long, env = "COSTWATCH_HTTP_PORT")]
        http_port: Option<u16>,

        /// Collection interval (e.g., "5m", "300s")
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },

    /// Run one collection cycle, dispatch alerts, and print a report
    Run {
        /// Write the JSON report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        &config.logging.level
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let result = match cli.command {
        Commands::Serve {
            http_port,
            interval,
        } => run_serve(config, http_port, interval).await,
        Commands::Run { output } => run_once(config, output).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn build_scheduler(
    config: &Config,
    registry: Arc<MetricsRegistry>,
) -> anyhow::Result<Scheduler> {
    let credentials = Arc::new(EnvCredentialStore::new());
    let adapters = providers::from_config(&config.providers, credentials);
    if adapters.is_empty() {
        warn!("no providers enabled; cycles will publish empty snapshots");
    }
    let dispatcher = Arc::new(AlertDispatcher::from_config(&config.notifications)?);
    let collector = Collector::new(adapters, &config.collector);

    Ok(Scheduler::new(
        collector,
        config.enabled_alerts(),
        dispatcher,
        registry,
        &config.scheduler,
    ))
}

async fn run_serve(
    mut config: Config,
    http_port: Option<u16>,
    interval: Option<Duration>,
) -> anyhow::Result<()> {
    if let Some(port) = http_port {
        config.server.http_port = port;
    }
    if let Some(interval) = interval {
        config.scheduler.interval = interval;
        config.validate()?;
    }

    let registry = Arc::new(MetricsRegistry::new()?);
    let scheduler = build_scheduler(&config, Arc::clone(&registry))?;
    tokio::spawn(scheduler.run());

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    HttpServer::new(registry).serve(&addr).await?;
    Ok(())
}

/// One-shot report, the JSON written by `costwatch run`
#[derive(Serialize)]
struct Report {
    analysis: Analysis,
    alerts: Vec<TriggeredAlert>,
}

async fn run_once(config: Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let registry = Arc::new(MetricsRegistry::new()?);
    let scheduler = build_scheduler(&config, registry)?;

    let cycle = scheduler.run_once().await;
    let report = Report {
        analysis: cycle.analysis.clone(),
        alerts: cycle.alerts.clone(),
    };
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
