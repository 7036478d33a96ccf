//! Azure Cost Management adapter

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::AzureConfig;
use crate::error::ProviderError;
use crate::models::{CostEntry, Provider, TimeRange};

use super::{CostProvider, CredentialStore};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "2023-03-01";

/// Adapter over the Cost Management query API, aggregated by service
pub struct AzureCostManagement {
    subscription_id: String,
    endpoint: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl AzureCostManagement {
    /// Create an adapter from its config section
    pub fn new(config: &AzureConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://management.azure.com".to_string());

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            subscription_id: config.subscription_id.clone(),
            endpoint,
            client,
            credentials,
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/providers/Microsoft.CostManagement/query?api-version={}",
            self.endpoint, self.subscription_id, API_VERSION
        )
    }
}

#[async_trait::async_trait]
impl CostProvider for AzureCostManagement {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    async fn fetch(&self, window: &TimeRange) -> Result<Vec<CostEntry>, ProviderError> {
        let credential = self.credentials.get_credential(Provider::Azure).await?;

        let query = serde_json::json!({
            "type": "ActualCost",
            "timeframe": "Custom",
            "timePeriod": {
                "from": window.start.to_rfc3339(),
                "to": window.end.to_rfc3339(),
            },
            "dataset": {
                "granularity": "None",
                "aggregation": {"totalCost": {"name": "Cost", "function": "Sum"}},
                "grouping": [{"type": "Dimension", "name": "ServiceName"}],
            },
        });

        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(credential)
            .json(&query)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(Provider::Azure, &e))?;

        check_status(response.status())?;

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::response(Provider::Azure, e.to_string()))?;

        let columns = &body.properties.columns;
        let cost_idx = column_index(columns, &["Cost", "PreTaxCost"])?;
        let service_idx = column_index(columns, &["ServiceName"])?;
        let currency_idx = column_index(columns, &["Currency"]).ok();

        let mut entries = Vec::with_capacity(body.properties.rows.len());
        for row in &body.properties.rows {
            let cost = cell_decimal(row, cost_idx)?;
            let service = cell_string(row, service_idx)?;
            let currency = currency_idx
                .and_then(|i| cell_string(row, i).ok())
                .unwrap_or_else(|| "USD".to_string());

            entries.push(CostEntry {
                provider: Provider::Azure,
                service,
                region: String::new(),
                cost,
                currency,
                timestamp: window.end,
                tags: Default::default(),
            });
        }

        debug!(services = entries.len(), "azure cost management fetch complete");
        Ok(entries)
    }
}

fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::auth(
            Provider::Azure,
            format!("cost management returned {status}"),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::throttled(
            Provider::Azure,
            "cost management rate limit exceeded",
        )),
        s if !s.is_success() => Err(ProviderError::response(
            Provider::Azure,
            format!("cost management returned {s}"),
        )),
        _ => Ok(()),
    }
}

fn column_index(columns: &[Column], names: &[&str]) -> Result<usize, ProviderError> {
    columns
        .iter()
        .position(|c| names.iter().any(|n| c.name == *n))
        .ok_or_else(|| {
            ProviderError::response(
                Provider::Azure,
                format!("missing expected column (one of {names:?})"),
            )
        })
}

fn cell_decimal(row: &[serde_json::Value], idx: usize) -> Result<Decimal, ProviderError> {
    let value = row
        .get(idx)
        .ok_or_else(|| ProviderError::response(Provider::Azure, "short result row"))?;
    match value {
        serde_json::Value::Number(n) => n.to_string().parse().map_err(|_| {
            ProviderError::response(Provider::Azure, format!("unparseable cost value '{n}'"))
        }),
        serde_json::Value::String(s) => s.parse().map_err(|_| {
            ProviderError::response(Provider::Azure, format!("unparseable cost value '{s}'"))
        }),
        other => Err(ProviderError::response(
            Provider::Azure,
            format!("unexpected cost cell {other}"),
        )),
    }
}

fn cell_string(row: &[serde_json::Value], idx: usize) -> Result<String, ProviderError> {
    row.get(idx)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::response(Provider::Azure, "short result row"))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    properties: QueryProperties,
}

#[derive(Debug, Deserialize)]
struct QueryProperties {
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}
