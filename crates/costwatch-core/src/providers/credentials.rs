//! Secrets boundary for provider credentials
//!
//! The core never inspects credential contents; adapters request an opaque
//! value per provider and pass it along as-is.

use crate::error::ProviderError;
use crate::models::Provider;

/// Opaque credential retrieval, one value per provider
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for a provider
    ///
    /// A missing credential is an authentication failure for that provider's
    /// adapter, never a process-level error.
    async fn get_credential(&self, provider: Provider) -> Result<String, ProviderError>;
}

/// Credential store backed by `COSTWATCH_<PROVIDER>_CREDENTIAL` variables
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    /// Create an environment-backed store
    pub fn new() -> Self {
        Self
    }

    fn var_name(provider: &Provider) -> String {
        format!(
            "COSTWATCH_{}_CREDENTIAL",
            provider.as_str().to_ascii_uppercase()
        )
    }
}

#[async_trait::async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_credential(&self, provider: Provider) -> Result<String, ProviderError> {
        let name = Self::var_name(&provider);
        std::env::var(&name)
            .map_err(|_| ProviderError::auth(provider, format!("{name} is not set")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_is_an_auth_error() {
        std::env::remove_var("COSTWATCH_FOO_CREDENTIAL");
        let store = EnvCredentialStore::new();
        let err = store
            .get_credential(Provider::Other("foo".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ProviderErrorKind::Auth);
    }

    #[tokio::test]
    async fn reads_credential_from_env() {
        std::env::set_var("COSTWATCH_BAR_CREDENTIAL", "secret");
        let store = EnvCredentialStore::new();
        let value = store
            .get_credential(Provider::Other("bar".to_string()))
            .await
            .unwrap();
        assert_eq!(value, "secret");
    }
}
