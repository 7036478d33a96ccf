//! Provider adapters - normalized access to cloud billing APIs
//!
//! Each adapter translates one provider's billing API into normalized
//! [`CostEntry`] records. New providers are added by implementing
//! [`CostProvider`], never by branching on provider names elsewhere.

mod aws;
mod azure;
mod credentials;
mod gcp;

pub use aws::AwsCostExplorer;
pub use azure::AzureCostManagement;
pub use credentials::{CredentialStore, EnvCredentialStore};
pub use gcp::GcpBilling;

use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::models::{CostEntry, Provider, TimeRange};

/// The capability every provider adapter implements
///
/// Adapters must not retry internally (retry policy belongs to the
/// collector) and must return `Ok(vec![])` for a window with no cost items.
#[async_trait::async_trait]
pub trait CostProvider: Send + Sync {
    /// Which provider this adapter fetches from
    fn provider(&self) -> Provider;

    /// Fetch the raw billing data for the window and normalize it
    async fn fetch(&self, window: &TimeRange) -> Result<Vec<CostEntry>, ProviderError>;
}

/// Build the enabled adapters from configuration
pub fn from_config(
    config: &ProvidersConfig,
    credentials: Arc<dyn CredentialStore>,
) -> Vec<Arc<dyn CostProvider>> {
    let mut providers: Vec<Arc<dyn CostProvider>> = Vec::new();

    if let Some(aws) = config.aws.as_ref().filter(|c| c.enabled) {
        providers.push(Arc::new(AwsCostExplorer::new(aws, credentials.clone())));
    }
    if let Some(azure) = config.azure.as_ref().filter(|c| c.enabled) {
        providers.push(Arc::new(AzureCostManagement::new(azure, credentials.clone())));
    }
    if let Some(gcp) = config.gcp.as_ref().filter(|c| c.enabled) {
        providers.push(Arc::new(GcpBilling::new(gcp, credentials.clone())));
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AwsConfig, AzureConfig};

    #[test]
    fn builds_only_enabled_providers() {
        let config = ProvidersConfig {
            aws: Some(AwsConfig {
                enabled: true,
                region: "us-east-1".to_string(),
                endpoint: None,
            }),
            azure: Some(AzureConfig {
                enabled: false,
                subscription_id: "sub".to_string(),
                endpoint: None,
            }),
            gcp: None,
        };

        let providers = from_config(&config, Arc::new(EnvCredentialStore::new()));
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider(), Provider::Aws);
    }
}
