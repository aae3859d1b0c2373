//! Provider configuration and construction
//!
//! Deserializes a vendor selection plus connection settings, loads
//! credentials, and builds the matching [`ProviderClient`]. Construction
//! validates everything it can before the first network call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use certsync_core::{ConfigError, DeployConfig, ProviderClient, SslDeployer, SyncResult};

use crate::credentials::{CredentialLoader, Credentials};
use crate::hetzner::HetznerProvider;
use crate::webhook::WebhookProvider;

/// Default vendor API request timeout in seconds
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Supported vendor integrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Hetzner,
    Webhook,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hetzner => "hetzner",
            Self::Webhook => "webhook",
        }
    }
}

/// Connection settings for one vendor integration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Which vendor client to build
    pub provider: ProviderKind,

    /// File to load API credentials from
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Environment variable to load API credentials from, consulted when
    /// `credentialsFile` is unset
    #[serde(default)]
    pub credentials_env: Option<String>,

    /// API base URL override; required for `webhook`, optional elsewhere
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Custom auth header name for the webhook endpoint
    #[serde(default)]
    pub auth_header: Option<String>,
}

fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

impl ProviderConfig {
    fn load_credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(path) = &self.credentials_file {
            return CredentialLoader::load_from_file(path);
        }
        if let Some(var) = &self.credentials_env {
            return CredentialLoader::load_from_env(var);
        }
        Err(ConfigError::Credentials(format!(
            "Provider '{}' needs 'credentialsFile' or 'credentialsEnv'",
            self.provider.as_str()
        )))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Build the vendor client a [`ProviderConfig`] selects
pub fn create_provider(config: &ProviderConfig) -> SyncResult<Arc<dyn ProviderClient>> {
    let provider: Arc<dyn ProviderClient> = match config.provider {
        ProviderKind::Hetzner => {
            let credentials = config.load_credentials()?;
            let token = credentials.token().ok_or_else(|| {
                ConfigError::Credentials(
                    "Hetzner requires a plain API token, not a key/secret pair".to_string(),
                )
            })?;
            Arc::new(HetznerProvider::new(
                token,
                config.endpoint.as_deref(),
                config.timeout(),
            )?)
        }
        ProviderKind::Webhook => {
            let endpoint = config.endpoint.as_deref().ok_or(ConfigError::MissingField {
                resource_type: "webhook",
                field: "endpoint",
            })?;
            // The webhook endpoint may be an internal unauthenticated service
            let credentials = match (&config.credentials_file, &config.credentials_env) {
                (None, None) => None,
                _ => Some(config.load_credentials()?),
            };
            Arc::new(WebhookProvider::new(
                endpoint,
                credentials,
                config.auth_header.clone(),
                config.timeout(),
            )?)
        }
    };

    info!(provider = provider.name(), "Provider client created");
    Ok(provider)
}

/// Build a deployer from provider and deploy configuration
///
/// The deploy configuration is validated here, so an unusable resource
/// selection surfaces at construction rather than mid-deploy.
pub fn create_deployer(
    provider_config: &ProviderConfig,
    deploy_config: DeployConfig,
) -> SyncResult<SslDeployer> {
    deploy_config.validate()?;
    let provider = create_provider(provider_config)?;
    Ok(SslDeployer::new(provider, deploy_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_from_camel_case() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "provider": "hetzner",
                "credentialsEnv": "HETZNER_TOKEN",
                "apiTimeoutSecs": 10
            }"#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Hetzner);
        assert_eq!(config.credentials_env.as_deref(), Some("HETZNER_TOKEN"));
        assert_eq!(config.api_timeout_secs, 10);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn timeout_defaults_to_thirty_seconds() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider": "webhook", "endpoint": "http://x"}"#).unwrap();
        assert_eq!(config.api_timeout_secs, DEFAULT_API_TIMEOUT_SECS);
    }

    #[test]
    fn missing_credentials_source_is_an_error() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider": "hetzner"}"#).unwrap();
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn webhook_without_endpoint_is_an_error() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider": "webhook"}"#).unwrap();
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("endpoint"));
    }
}
