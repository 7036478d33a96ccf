//! AWS Cost Explorer adapter

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AwsConfig;
use crate::error::ProviderError;
use crate::models::{CostEntry, Provider, TimeRange};

use super::{CostProvider, CredentialStore};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Adapter over the Cost Explorer `GetCostAndUsage` operation, grouped by
/// service with daily granularity
pub struct AwsCostExplorer {
    region: String,
    endpoint: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl AwsCostExplorer {
    /// Create an adapter from its config section
    pub fn new(config: &AwsConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://ce.{}.amazonaws.com", config.region));

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            region: config.region.clone(),
            endpoint,
            client,
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl CostProvider for AwsCostExplorer {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn fetch(&self, window: &TimeRange) -> Result<Vec<CostEntry>, ProviderError> {
        let credential = self.credentials.get_credential(Provider::Aws).await?;

        let query = CostAndUsageQuery {
            time_period: DatePeriod {
                start: window.start.format("%Y-%m-%d").to_string(),
                end: window.end.format("%Y-%m-%d").to_string(),
            },
            granularity: "DAILY".to_string(),
            metrics: vec!["UnblendedCost".to_string()],
            group_by: vec![GroupDefinition {
                r#type: "DIMENSION".to_string(),
                key: "SERVICE".to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-amz-target", "AWSInsightsIndexService.GetCostAndUsage")
            .bearer_auth(credential)
            .json(&query)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(Provider::Aws, &e))?;

        check_status(response.status())?;

        let body: CostAndUsageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::response(Provider::Aws, e.to_string()))?;

        let mut entries = Vec::new();
        for result in &body.results_by_time {
            let timestamp = parse_day(&result.time_period.start).unwrap_or(window.end);
            for group in &result.groups {
                let Some(service) = group.keys.first() else {
                    continue;
                };
                let Some(metric) = group.metrics.get("UnblendedCost") else {
                    continue;
                };
                let cost: Decimal = metric.amount.parse().map_err(|_| {
                    ProviderError::response(
                        Provider::Aws,
                        format!("unparseable cost amount '{}'", metric.amount),
                    )
                })?;

                entries.push(CostEntry {
                    provider: Provider::Aws,
                    service: service.clone(),
                    region: self.region.clone(),
                    cost,
                    currency: metric.unit.clone(),
                    timestamp,
                    tags: Default::default(),
                });
            }
        }

        debug!(services = entries.len(), "aws cost explorer fetch complete");
        Ok(entries)
    }
}

fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::auth(
            Provider::Aws,
            format!("cost explorer returned {status}"),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::throttled(
            Provider::Aws,
            "cost explorer rate limit exceeded",
        )),
        s if !s.is_success() => Err(ProviderError::response(
            Provider::Aws,
            format!("cost explorer returned {s}"),
        )),
        _ => Ok(()),
    }
}

fn parse_day(day: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Serialize)]
struct CostAndUsageQuery {
    #[serde(rename = "TimePeriod")]
    time_period: DatePeriod,
    #[serde(rename = "Granularity")]
    granularity: String,
    #[serde(rename = "Metrics")]
    metrics: Vec<String>,
    #[serde(rename = "GroupBy")]
    group_by: Vec<GroupDefinition>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatePeriod {
    #[serde(rename = "Start")]
    start: String,
    #[serde(rename = "End")]
    end: String,
}

#[derive(Debug, Serialize)]
struct GroupDefinition {
    #[serde(rename = "Type")]
    r#type: String,
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Debug, Deserialize)]
struct CostAndUsageResponse {
    #[serde(rename = "ResultsByTime", default)]
    results_by_time: Vec<ResultByTime>,
}

#[derive(Debug, Deserialize)]
struct ResultByTime {
    #[serde(rename = "TimePeriod")]
    time_period: DatePeriod,
    #[serde(rename = "Groups", default)]
    groups: Vec<CostGroup>,
}

#[derive(Debug, Deserialize)]
struct CostGroup {
    #[serde(rename = "Keys", default)]
    keys: Vec<String>,
    #[serde(rename = "Metrics", default)]
    metrics: std::collections::HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
struct MetricValue {
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Unit")]
    unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(endpoint: &str) -> AwsCostExplorer {
        std::env::set_var("COSTWATCH_AWS_CREDENTIAL", "test-token");
        AwsCostExplorer::new(
            &AwsConfig {
                enabled: true,
                region: "us-east-1".to_string(),
                endpoint: Some(endpoint.to_string()),
            },
            Arc::new(super::super::EnvCredentialStore::new()),
        )
    }

    fn window() -> TimeRange {
        TimeRange::trailing(Duration::from_secs(86_400))
    }

    #[tokio::test]
    async fn parses_grouped_costs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSInsightsIndexService.GetCostAndUsage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ResultsByTime": [{
                    "TimePeriod": {"Start": "2026-08-25", "End": "2026-08-26"},
                    "Groups": [
                        {"Keys": ["ec2"], "Metrics": {"UnblendedCost": {"Amount": "500", "Unit": "USD"}}},
                        {"Keys": ["s3"], "Metrics": {"UnblendedCost": {"Amount": "100.25", "Unit": "USD"}}}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let entries = adapter(&server.uri()).fetch(&window()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service, "ec2");
        assert_eq!(entries[0].cost, dec!(500));
        assert_eq!(entries[1].cost, dec!(100.25));
        assert_eq!(entries[0].region, "us-east-1");
    }

    #[tokio::test]
    async fn empty_window_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ResultsByTime": []})),
            )
            .mount(&server)
            .await;

        let entries = adapter(&server.uri()).fetch(&window()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).fetch(&window()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert_eq!(err.provider, Provider::Aws);
    }

    #[tokio::test]
    async fn throttling_maps_to_throttled_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).fetch(&window()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Throttled);
    }
}
