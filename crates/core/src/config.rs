//! Deploy target configuration
//!
//! A provider-specific, serde-friendly record naming which resource to
//! act on. Validation runs eagerly at the start of a deploy, before any
//! network call; a missing companion field is a configuration error,
//! never silently defaulted.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Resource kind a deploy acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A slot with exactly one active certificate (WAF instance, vault entry)
    Certificate,
    /// A single load-balancer listener
    Listener,
    /// All TLS listeners of a load balancer
    Loadbalancer,
    /// A CDN / API-gateway custom domain
    Domain,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Listener => "listener",
            Self::Loadbalancer => "loadbalancer",
            Self::Domain => "domain",
        }
    }
}

/// Raw deploy configuration as handed in by a caller
///
/// Which companion fields are required depends on `resource_type`; see
/// [`DeployConfig::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub resource_type: ResourceType,
    /// Required for `resourceType=certificate`
    #[serde(default)]
    pub certificate_id: Option<String>,
    /// Required for `resourceType=listener`
    #[serde(default)]
    pub listener_id: Option<String>,
    /// Required for `resourceType=loadbalancer`
    #[serde(default)]
    pub loadbalancer_id: Option<String>,
    /// Required for `resourceType=domain`; optional SNI target for
    /// listener and loadbalancer deploys
    #[serde(default)]
    pub domain: Option<String>,
}

/// Validated deploy target, a closed union over resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    CertificateSlot {
        certificate_id: String,
    },
    Listener {
        listener_id: String,
        sni_domain: Option<String>,
    },
    LoadBalancer {
        loadbalancer_id: String,
        sni_domain: Option<String>,
    },
    Domain {
        domain: String,
    },
}

impl DeployConfig {
    /// Validate companion fields and produce the target union
    pub fn validate(&self) -> Result<ResourceTarget, ConfigError> {
        match self.resource_type {
            ResourceType::Certificate => Ok(ResourceTarget::CertificateSlot {
                certificate_id: required(&self.certificate_id, "certificate", "certificateId")?,
            }),
            ResourceType::Listener => Ok(ResourceTarget::Listener {
                listener_id: required(&self.listener_id, "listener", "listenerId")?,
                sni_domain: optional(&self.domain),
            }),
            ResourceType::Loadbalancer => Ok(ResourceTarget::LoadBalancer {
                loadbalancer_id: required(
                    &self.loadbalancer_id,
                    "loadbalancer",
                    "loadbalancerId",
                )?,
                sni_domain: optional(&self.domain),
            }),
            ResourceType::Domain => Ok(ResourceTarget::Domain {
                domain: required(&self.domain, "domain", "domain")?,
            }),
        }
    }
}

fn required(
    value: &Option<String>,
    resource_type: &'static str,
    field: &'static str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingField {
            resource_type,
            field,
        }),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
