//! Generic webhook provider
//!
//! Talks to a user-operated HTTP endpoint instead of a specific vendor
//! API, so any infrastructure can be synchronized by standing up a small
//! adapter service. The endpoint implements:
//!
//! ```text
//! GET  {base}/certificates?cursor={c}   -> {"certificates": [...], "next_cursor": "..."}
//! POST {base}/certificates              <- {"name", "certificate", "private_key"}
//!                                       -> {"id", "name"}
//! GET  {base}/slots/{slot_id}           -> certificate record, or 404 when empty
//! PUT  {base}/slots/{slot_id}           <- {"certificate_id"}
//! GET  {base}/domains?domain={d}        -> {"domains": [{...full configuration...}]}
//! PUT  {base}/domains/{id}              <- full configuration with new certificate_id
//! ```
//!
//! Certificate records carry whichever of `common_name`,
//! `subject_alt_names`, `not_before`, `not_after`, `fingerprint` and
//! `certificate` the adapter can produce; matching degrades over the
//! fields present. Domain updates are replace-style: the full object from
//! the lookup is submitted back with only `certificate_id` changed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use certsync_core::{
    CertificatePage, CertificateSlotApi, CertificateStore, DomainConfig, DomainEndpoint,
    PageToken, ProviderClient, ProviderError, ProviderResult, RemoteCertificate, UploadResult,
};

use crate::credentials::Credentials;

/// Generic webhook provider client
#[derive(Debug)]
pub struct WebhookProvider {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    /// Custom auth header name; `Authorization: Bearer <token>` when unset
    auth_header: Option<String>,
}

impl WebhookProvider {
    pub fn new(
        endpoint: &str,
        credentials: Option<Credentials>,
        auth_header: Option<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            credentials,
            auth_header,
        })
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            None => request,
            Some(credentials) => match &self.auth_header {
                Some(header) => request.header(header, credentials.as_bearer_token()),
                None => request.bearer_auth(credentials.as_bearer_token()),
            },
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<reqwest::Response> {
        let response = self.add_auth(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout { operation }
            } else {
                ProviderError::Api {
                    operation,
                    message: e.to_string(),
                }
            }
        })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Authentication(
                "Webhook endpoint rejected the credentials".to_string(),
            ));
        }

        Ok(response)
    }

    async fn expect_success(
        operation: &'static str,
        response: reqwest::Response,
    ) -> ProviderResult<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                operation,
                message: format!("HTTP {} - {}", status, body),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CertificateStore for WebhookProvider {
    async fn list_certificates(&self, page: Option<PageToken>) -> ProviderResult<CertificatePage> {
        let url = format!("{}/certificates", self.base_url);
        let mut request = self.client.get(&url);
        match page {
            None => {}
            Some(PageToken::Cursor(cursor)) => {
                request = request.query(&[("cursor", cursor.as_str())]);
            }
            Some(other) => {
                return Err(ProviderError::Configuration(format!(
                    "Unsupported page token for webhook endpoint: {:?}",
                    other
                )))
            }
        }

        let response = self.send("list_certificates", request).await?;
        let response = Self::expect_success("list_certificates", response).await?;
        let parsed: ListCertificatesResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "list_certificates",
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        debug!(count = parsed.certificates.len(), "Listed webhook certificates");

        let next = parsed
            .next_cursor
            .filter(|cursor| !cursor.is_empty())
            .map(PageToken::Cursor);

        Ok(CertificatePage {
            certificates: parsed
                .certificates
                .into_iter()
                .map(WebhookCertificate::into_record)
                .collect(),
            next,
        })
    }

    async fn create_certificate(
        &self,
        name: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> ProviderResult<UploadResult> {
        debug!(name, "Uploading certificate to webhook endpoint");

        let request = CreateCertificateRequest {
            name: name.to_string(),
            certificate: cert_pem.to_string(),
            private_key: key_pem.to_string(),
        };

        let url = format!("{}/certificates", self.base_url);
        let response = self
            .send("create_certificate", self.client.post(&url).json(&request))
            .await?;
        let response = Self::expect_success("create_certificate", response).await?;
        let created: CreateCertificateResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "create_certificate",
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        Ok(UploadResult::new(
            created.id,
            created.name.unwrap_or_else(|| name.to_string()),
        ))
    }
}

#[async_trait]
impl CertificateSlotApi for WebhookProvider {
    async fn get_slot_certificate(
        &self,
        slot_id: &str,
    ) -> ProviderResult<Option<RemoteCertificate>> {
        let url = format!("{}/slots/{}", self.base_url, slot_id);
        let response = self.send("get_slot_certificate", self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success("get_slot_certificate", response).await?;
        let certificate: WebhookCertificate = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "get_slot_certificate",
                message: format!("Failed to parse response: {}", e),
            }
        })?;
        Ok(Some(certificate.into_record()))
    }

    async fn update_slot_certificate(&self, slot_id: &str, cert_id: &str) -> ProviderResult<()> {
        debug!(slot_id, cert_id, "Updating webhook certificate slot");

        let url = format!("{}/slots/{}", self.base_url, slot_id);
        let body = serde_json::json!({ "certificate_id": cert_id });
        let response = self
            .send("update_slot_certificate", self.client.put(&url).json(&body))
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                resource: "certificate slot",
                identifier: slot_id.to_string(),
            });
        }
        Self::expect_success("update_slot_certificate", response).await?;
        Ok(())
    }
}

#[async_trait]
impl DomainEndpoint for WebhookProvider {
    async fn find_domain(&self, domain: &str) -> ProviderResult<Option<DomainConfig>> {
        let url = format!("{}/domains", self.base_url);
        let request = self.client.get(&url).query(&[("domain", domain)]);
        let response = self.send("find_domain", request).await?;
        let response = Self::expect_success("find_domain", response).await?;
        let parsed: ListDomainsResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "find_domain",
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        let matched = parsed.domains.into_iter().find_map(|value| {
            let config = split_domain_object(value)?;
            config.domain.eq_ignore_ascii_case(domain).then_some(config)
        });
        Ok(matched)
    }

    async fn update_domain(&self, config: &DomainConfig) -> ProviderResult<()> {
        debug!(
            domain = %config.domain,
            domain_id = %config.domain_id,
            "Updating webhook domain configuration"
        );

        let url = format!("{}/domains/{}", self.base_url, config.domain_id);
        let body = join_domain_object(config);
        let response = self.send("update_domain", self.client.put(&url).json(&body)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                resource: "domain",
                identifier: config.domain.clone(),
            });
        }
        Self::expect_success("update_domain", response).await?;
        Ok(())
    }
}

impl ProviderClient for WebhookProvider {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn certificate_slot(&self) -> Option<&dyn CertificateSlotApi> {
        Some(self)
    }

    fn domain_endpoint(&self) -> Option<&dyn DomainEndpoint> {
        Some(self)
    }
}

/// Pull `id`, `domain` and `certificate_id` out of a domain object; the
/// remaining fields stay in `settings` and round-trip untouched
fn split_domain_object(value: Value) -> Option<DomainConfig> {
    let mut object = match value {
        Value::Object(object) => object,
        _ => return None,
    };

    let domain_id = take_string(&mut object, "id")?;
    let domain = take_string(&mut object, "domain")?;
    let certificate_id = take_string(&mut object, "certificate_id");

    Some(DomainConfig {
        domain_id,
        domain,
        certificate_id,
        settings: Value::Object(object),
    })
}

/// Rebuild the full replace-style update body from a [`DomainConfig`]
fn join_domain_object(config: &DomainConfig) -> Value {
    let mut object = match &config.settings {
        Value::Object(settings) => settings.clone(),
        _ => Map::new(),
    };
    object.insert("id".to_string(), Value::from(config.domain_id.clone()));
    object.insert("domain".to_string(), Value::from(config.domain.clone()));
    if let Some(cert_id) = &config.certificate_id {
        object.insert("certificate_id".to_string(), Value::from(cert_id.clone()));
    }
    Value::Object(object)
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Webhook wire types

#[derive(Debug, Deserialize)]
struct ListDomainsResponse {
    #[serde(default)]
    domains: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ListCertificatesResponse {
    #[serde(default)]
    certificates: Vec<WebhookCertificate>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookCertificate {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    common_name: Option<String>,
    #[serde(default)]
    subject_alt_names: Option<Vec<String>>,
    #[serde(default)]
    not_before: Option<DateTime<Utc>>,
    #[serde(default)]
    not_after: Option<DateTime<Utc>>,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    certificate: Option<String>,
}

impl WebhookCertificate {
    fn into_record(self) -> RemoteCertificate {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let mut record = RemoteCertificate::new(self.id, name);
        record.common_name = self.common_name;
        record.subject_alt_names = self.subject_alt_names;
        record.not_before = self.not_before;
        record.not_after = self.not_after;
        record.fingerprint = self.fingerprint;
        record.body_pem = self.certificate;
        record
    }
}

#[derive(Debug, Serialize)]
struct CreateCertificateRequest {
    name: String,
    certificate: String,
    private_key: String,
}

#[derive(Debug, Deserialize)]
struct CreateCertificateResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn domain_object_round_trip_preserves_settings() {
        let object = json!({
            "id": "dom-1",
            "domain": "cdn.example.com",
            "certificate_id": "cert-9",
            "origin": "origin.example.com",
            "http2": true,
        });

        let config = split_domain_object(object).unwrap();
        assert_eq!(config.domain_id, "dom-1");
        assert_eq!(config.certificate_id.as_deref(), Some("cert-9"));
        assert_eq!(config.settings["origin"], "origin.example.com");

        let rebuilt = join_domain_object(&config);
        assert_eq!(rebuilt["http2"], true);
        assert_eq!(rebuilt["certificate_id"], "cert-9");
        assert_eq!(rebuilt["domain"], "cdn.example.com");
    }

    #[test]
    fn domain_object_with_numeric_id() {
        let config = split_domain_object(json!({
            "id": 17,
            "domain": "api.example.com",
        }))
        .unwrap();
        assert_eq!(config.domain_id, "17");
        assert!(config.certificate_id.is_none());
    }

    #[test]
    fn domain_listing_defaults_to_empty() {
        let parsed: ListDomainsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.domains.is_empty());

        let parsed: ListDomainsResponse = serde_json::from_value(json!({
            "domains": [{"id": "d-1", "domain": "a.example.com"}],
        }))
        .unwrap();
        assert_eq!(parsed.domains.len(), 1);
    }

    #[test]
    fn certificate_record_defaults() {
        let cert: WebhookCertificate = serde_json::from_value(json!({"id": "c-1"})).unwrap();
        let record = cert.into_record();
        assert_eq!(record.id, "c-1");
        assert_eq!(record.name, "c-1");
        assert!(record.fingerprint.is_none());
    }
}
