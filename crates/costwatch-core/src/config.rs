//! Configuration management for costwatch

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::AlertRule;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Collector configuration
    pub collector: CollectorConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Per-provider configuration
    pub providers: ProvidersConfig,

    /// Alert rules, evaluated in declaration order
    pub alerts: Vec<AlertRule>,

    /// Notification channel configuration
    pub notifications: NotificationsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional YAML file plus `COSTWATCH_*`
    /// environment overrides, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let config: Self = builder
            .add_source(::config::Environment::with_prefix("COSTWATCH").separator("__"))
            .build()
            .map_err(|e| Error::config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that must hold before the scheduler starts.
    ///
    /// Violations are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval.is_zero() {
            return Err(Error::config("scheduler.interval must be non-zero"));
        }
        if self.collector.window.is_zero() {
            return Err(Error::config("collector.window must be non-zero"));
        }
        if self.collector.provider_timeout.is_zero() {
            return Err(Error::config("collector.provider_timeout must be non-zero"));
        }

        for rule in &self.alerts {
            if rule.name.is_empty() {
                return Err(Error::config("alert rule with empty name"));
            }
            if rule.threshold < Decimal::ZERO {
                return Err(Error::config(format!(
                    "alert rule '{}' has a negative threshold",
                    rule.name
                )));
            }
            for channel in &rule.notification_channels {
                let known = match channel.as_str() {
                    "slack" => self.notifications.slack.is_some(),
                    "email" => self.notifications.email.is_some(),
                    _ => false,
                };
                if !known {
                    return Err(Error::config(format!(
                        "alert rule '{}' references unconfigured channel '{}'",
                        rule.name, channel
                    )));
                }
            }
        }

        if let Some(email) = &self.notifications.email {
            if email.to.is_empty() {
                return Err(Error::config("notifications.email.to must not be empty"));
            }
        }

        Ok(())
    }

    /// The enabled alert rules, in declaration order
    pub fn enabled_alerts(&self) -> Vec<AlertRule> {
        self.alerts.iter().filter(|r| r.enabled).cloned().collect()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP port for the exposition endpoint and JSON API
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
        }
    }
}

/// Collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Trailing collection window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Per-adapter fetch timeout
    #[serde(with = "humantime_serde")]
    pub provider_timeout: Duration,
    /// Budget for the whole fan-out; pending adapters past this are
    /// treated as timed out and the cycle proceeds with what completed
    #[serde(with = "humantime_serde")]
    pub cycle_timeout: Duration,
    /// Maximum adapters fetching concurrently within one cycle
    pub max_concurrent_fetches: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(24 * 60 * 60),
            provider_timeout: Duration::from_secs(30),
            cycle_timeout: Duration::from_secs(120),
            max_concurrent_fetches: 4,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between collection cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

/// Per-provider configuration; absent or disabled providers are skipped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// AWS Cost Explorer
    pub aws: Option<AwsConfig>,
    /// Azure Cost Management
    pub azure: Option<AzureConfig>,
    /// GCP Billing
    pub gcp: Option<GcpConfig>,
}

/// AWS Cost Explorer adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Whether the adapter runs
    #[serde(default)]
    pub enabled: bool,
    /// Region scope for the query
    pub region: String,
    /// Endpoint override (tests, private gateways)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Azure Cost Management adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Whether the adapter runs
    #[serde(default)]
    pub enabled: bool,
    /// Subscription to query
    pub subscription_id: String,
    /// Endpoint override (tests, private gateways)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// GCP Billing adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Whether the adapter runs
    #[serde(default)]
    pub enabled: bool,
    /// Project to query
    pub project_id: String,
    /// Endpoint override (tests, private gateways)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Notification channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Slack incoming webhook
    pub slack: Option<SlackConfig>,
    /// SMTP email
    pub email: Option<EmailConfig>,
}

/// Slack webhook channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: String,
    /// Channel override (e.g., "#cost-alerts")
    #[serde(default)]
    pub channel: Option<String>,
}

/// SMTP email channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username
    pub username: String,
    /// SMTP password
    pub password: String,
    /// From address
    pub from: String,
    /// Recipient addresses
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
