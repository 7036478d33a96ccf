//! GCP Billing adapter

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::GcpConfig;
use crate::error::ProviderError;
use crate::models::{CostEntry, Provider, TimeRange};

use super::{CostProvider, CredentialStore};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Adapter over the billing export summary for a project, one row per
/// service
pub struct GcpBilling {
    project_id: String,
    endpoint: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl GcpBilling {
    /// Create an adapter from its config section
    pub fn new(config: &GcpConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://cloudbilling.googleapis.com".to_string());

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            project_id: config.project_id.clone(),
            endpoint,
            client,
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl CostProvider for GcpBilling {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn fetch(&self, window: &TimeRange) -> Result<Vec<CostEntry>, ProviderError> {
        let credential = self.credentials.get_credential(Provider::Gcp).await?;

        let url = format!(
            "{}/v1/projects/{}/serviceCosts",
            self.endpoint, self.project_id
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(credential)
            .query(&[
                ("startTime", window.start.to_rfc3339()),
                ("endTime", window.end.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(Provider::Gcp, &e))?;

        check_status(response.status())?;

        let body: ServiceCostsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::response(Provider::Gcp, e.to_string()))?;

        let mut entries = Vec::with_capacity(body.service_costs.len());
        for row in body.service_costs {
            let cost: Decimal = row.cost.parse().map_err(|_| {
                ProviderError::response(
                    Provider::Gcp,
                    format!("unparseable cost amount '{}'", row.cost),
                )
            })?;

            entries.push(CostEntry {
                provider: Provider::Gcp,
                service: row.service,
                region: row.region.unwrap_or_default(),
                cost,
                currency: row.currency.unwrap_or_else(|| "USD".to_string()),
                timestamp: window.end,
                tags: Default::default(),
            });
        }

        debug!(services = entries.len(), "gcp billing fetch complete");
        Ok(entries)
    }
}

fn check_status(status: StatusCode) -> Result<(), ProviderError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::auth(
            Provider::Gcp,
            format!("billing api returned {status}"),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::throttled(
            Provider::Gcp,
            "billing api rate limit exceeded",
        )),
        s if !s.is_success() => Err(ProviderError::response(
            Provider::Gcp,
            format!("billing api returned {s}"),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct ServiceCostsResponse {
    #[serde(rename = "serviceCosts", default)]
    service_costs: Vec<ServiceCost>,
}

#[derive(Debug, Deserialize)]
struct ServiceCost {
    service: String,
    cost: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    region: Option<String>,
}
