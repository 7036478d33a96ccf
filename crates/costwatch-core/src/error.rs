//! Error types for costwatch

use std::fmt;

use thiserror::Error;

use crate::models::Provider;

/// Result type alias using costwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for costwatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error; fatal at startup, before the scheduler begins
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider adapter error; contained by the collector, never fatal
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Notification dispatch error; logged, never propagated into a cycle
    #[error("Notification error: {0}")]
    Notification(String),

    /// HTTP server error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }
}

/// What went wrong talking to a billing API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Authentication or authorization failure
    Auth,
    /// API throttling (rate limited)
    Throttled,
    /// Transport-level failure
    Network,
    /// The adapter did not respond within its timeout
    Timeout,
    /// Unexpected status or unparseable response body
    Response,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Throttled => "throttled",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Response => "response",
        };
        f.write_str(name)
    }
}

/// An adapter-scoped failure, always recoverable at the collector level
#[derive(Error, Debug, Clone)]
#[error("{provider} fetch failed ({kind}): {message}")]
pub struct ProviderError {
    /// Which provider's adapter failed
    pub provider: Provider,
    /// Failure category
    pub kind: ProviderErrorKind,
    /// Human-readable cause
    pub message: String,
}

impl ProviderError {
    /// Create a provider error
    pub fn new(provider: Provider, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// Authentication failure
    pub fn auth(provider: Provider, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Auth, message)
    }

    /// Throttled by the provider API
    pub fn throttled(provider: Provider, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Throttled, message)
    }

    /// Transport failure
    pub fn network(provider: Provider, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Network, message)
    }

    /// Fetch exceeded its timeout
    pub fn timeout(provider: Provider, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Timeout, message)
    }

    /// Unexpected response
    pub fn response(provider: Provider, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Response, message)
    }

    /// Classify a reqwest error against the provider it came from
    pub fn from_reqwest(provider: Provider, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(provider, err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::network(provider, err.to_string())
        } else {
            Self::response(provider, err.to_string())
        }
    }
}
