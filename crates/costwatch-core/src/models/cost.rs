//! Cost entry and snapshot data models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A cloud provider whose billing API we collect from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provider {
    /// Amazon Web Services
    Aws,
    /// Microsoft Azure
    Azure,
    /// Google Cloud Platform
    Gcp,
    /// Any other provider, identified by name
    Other(String),
}

impl Provider {
    /// The lowercase name used in config, labels and serialized output
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Provider {
    fn from(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "aws" => Self::Aws,
            "azure" => Self::Azure,
            "gcp" => Self::Gcp,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(name))
    }
}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Provider {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// A single normalized billing line item
///
/// Immutable once produced by a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    /// Provider that billed this cost
    pub provider: Provider,

    /// Service name (e.g., "ec2", "virtual-machines")
    pub service: String,

    /// Region the cost was incurred in (may be empty)
    #[serde(default)]
    pub region: String,

    /// Cost amount (non-negative)
    pub cost: Decimal,

    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,

    /// When the cost was incurred (UTC)
    pub timestamp: DateTime<Utc>,

    /// Additional metadata tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl CostEntry {
    /// Create an entry with defaults for region, currency, timestamp and tags
    pub fn new(provider: Provider, service: impl Into<String>, cost: Decimal) -> Self {
        Self {
            provider,
            service: service.into(),
            region: String::new(),
            cost,
            currency: default_currency(),
            timestamp: Utc::now(),
            tags: BTreeMap::new(),
        }
    }
}

/// The time window one collection cycle covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start (inclusive)
    pub start: DateTime<Utc>,
    /// Window end (exclusive)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// A window of the given length ending now
    pub fn trailing(length: std::time::Duration) -> Self {
        let end = Utc::now();
        let start = end
            - ChronoDuration::from_std(length).unwrap_or_else(|_| ChronoDuration::days(1));
        Self { start, end }
    }

    /// Window length
    pub fn duration(&self) -> ChronoDuration {
        self.end - self.start
    }

    /// Window length in (fractional) days
    pub fn days(&self) -> f64 {
        self.duration().num_seconds() as f64 / 86_400.0
    }
}

/// One complete, time-bounded set of cost entries from one collection cycle
///
/// A snapshot with zero entries and zero errors is valid (no providers
/// enabled, or a genuinely cost-free window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Normalized entries, in adapter completion order
    pub entries: Vec<CostEntry>,

    /// The window the entries cover
    pub window: TimeRange,

    /// When this snapshot was assembled
    pub collected_at: DateTime<Utc>,

    /// Providers that failed this cycle, with the failure description
    pub provider_errors: BTreeMap<Provider, String>,
}

impl Snapshot {
    /// A snapshot with no entries and no errors for the given window
    pub fn empty(window: TimeRange) -> Self {
        Self {
            entries: Vec::new(),
            window,
            collected_at: Utc::now(),
            provider_errors: BTreeMap::new(),
        }
    }
}
