//! Hetzner Cloud provider
//!
//! Uses the Hetzner Cloud API for the certificate store (uploaded
//! certificates, page + per_page pagination) and for binding certificates
//! to load-balancer services. API documentation:
//! <https://docs.hetzner.cloud>
//!
//! Hetzner has no standalone listener objects; a load balancer carries a
//! list of services keyed by listen port. Listener identifiers are
//! therefore `<loadbalancer-id>:<listen-port>`. Service updates replace
//! the service definition, so every mutation reads the current service
//! object and submits it back with only the certificate list changed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use certsync_core::{
    CertificatePage, CertificateStore, ListenerDetail, ListenerEndpoint, ListenerPage,
    ListenerProtocol, ListenerSummary, PageToken, ProviderClient, ProviderError, ProviderResult,
    RemoteCertificate, SniBinding, UploadResult,
};

/// Hetzner Cloud API base URL
const HETZNER_API_BASE: &str = "https://api.hetzner.cloud/v1";

/// Certificates fetched per listing page
const PER_PAGE: u32 = 50;

/// Cached identity of a bound certificate, used to hydrate SNI bindings
#[derive(Debug, Clone)]
struct CachedCertificate {
    domain: String,
    not_after: Option<DateTime<Utc>>,
}

/// Hetzner Cloud provider client
#[derive(Debug)]
pub struct HetznerProvider {
    client: Client,
    token: String,
    base_url: String,
    /// Cache of certificate id -> identity, to avoid re-fetching details
    /// for every binding on every listener read
    cert_cache: RwLock<HashMap<String, CachedCertificate>>,
}

impl HetznerProvider {
    /// Create a new Hetzner Cloud provider
    ///
    /// `endpoint` overrides the public API base URL (used in tests).
    pub fn new(
        token: &str,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        let base_url = endpoint
            .unwrap_or(HETZNER_API_BASE)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            token: token.to_string(),
            base_url,
            cert_cache: RwLock::new(HashMap::new()),
        })
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
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
                "Invalid Hetzner API token".to_string(),
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

    async fn get_certificate(&self, cert_id: &str) -> ProviderResult<HetznerCertificate> {
        let url = format!("{}/certificates/{}", self.base_url, cert_id);
        let response = self.send("get_certificate", self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                resource: "certificate",
                identifier: cert_id.to_string(),
            });
        }
        let response = Self::expect_success("get_certificate", response).await?;
        let parsed: CertificateResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "get_certificate",
                message: format!("Failed to parse response: {}", e),
            }
        })?;
        Ok(parsed.certificate)
    }

    /// Identity of a bound certificate, via cache or a detail fetch
    async fn certificate_identity(&self, cert_id: &str) -> ProviderResult<CachedCertificate> {
        {
            let cache = self.cert_cache.read();
            if let Some(cached) = cache.get(cert_id) {
                trace!(cert_id, "Certificate identity found in cache");
                return Ok(cached.clone());
            }
        }

        let certificate = self.get_certificate(cert_id).await?;
        let identity = CachedCertificate {
            domain: certificate.domain_names.first().cloned().unwrap_or_default(),
            not_after: certificate.not_valid_after,
        };

        self.cert_cache
            .write()
            .insert(cert_id.to_string(), identity.clone());
        Ok(identity)
    }

    async fn get_load_balancer(&self, lb_id: &str) -> ProviderResult<Value> {
        let url = format!("{}/load_balancers/{}", self.base_url, lb_id);
        let response = self.send("get_load_balancer", self.client.get(&url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                resource: "load balancer",
                identifier: lb_id.to_string(),
            });
        }
        let response = Self::expect_success("get_load_balancer", response).await?;
        let mut body: Value = response.json().await.map_err(|e| ProviderError::Api {
            operation: "get_load_balancer",
            message: format!("Failed to parse response: {}", e),
        })?;
        Ok(body["load_balancer"].take())
    }

    async fn update_service(&self, lb_id: &str, service: &Value) -> ProviderResult<()> {
        let url = format!(
            "{}/load_balancers/{}/actions/update_service",
            self.base_url, lb_id
        );
        let response = self
            .send("update_service", self.client.post(&url).json(service))
            .await?;
        Self::expect_success("update_service", response).await?;
        Ok(())
    }

    /// Read the addressed service, apply `mutate` to its certificate id
    /// list, and submit the full service object back
    async fn modify_service_certificates<F>(
        &self,
        listener_id: &str,
        mutate: F,
    ) -> ProviderResult<()>
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let (lb_id, port) = parse_listener_id(listener_id)?;
        let load_balancer = self.get_load_balancer(&lb_id).await?;
        let mut service = find_service(&load_balancer, port, listener_id)?;

        let object = service.as_object_mut().ok_or_else(|| ProviderError::Api {
            operation: "update_service",
            message: format!("Service '{}' is not an object", listener_id),
        })?;
        let http = object.entry("http").or_insert_with(|| json!({}));
        let certificates = http
            .as_object_mut()
            .ok_or_else(|| ProviderError::Api {
                operation: "update_service",
                message: format!("Service '{}' has a malformed http section", listener_id),
            })?
            .entry("certificates")
            .or_insert_with(|| json!([]));
        let Some(ids) = certificates.as_array_mut() else {
            return Err(ProviderError::Api {
                operation: "update_service",
                message: format!("Service '{}' has a malformed certificate list", listener_id),
            });
        };
        mutate(ids);

        self.update_service(&lb_id, &service).await
    }
}

#[async_trait]
impl CertificateStore for HetznerProvider {
    async fn list_certificates(&self, page: Option<PageToken>) -> ProviderResult<CertificatePage> {
        let page_number = match page {
            None => 1,
            Some(PageToken::PageNumber(n)) => n,
            Some(other) => {
                return Err(ProviderError::Configuration(format!(
                    "Unsupported page token for Hetzner: {:?}",
                    other
                )))
            }
        };

        let url = format!(
            "{}/certificates?page={}&per_page={}",
            self.base_url, page_number, PER_PAGE
        );
        let response = self.send("list_certificates", self.client.get(&url)).await?;
        let response = Self::expect_success("list_certificates", response).await?;
        let parsed: CertificatesResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "list_certificates",
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        debug!(
            page = page_number,
            count = parsed.certificates.len(),
            "Listed Hetzner certificates"
        );

        let next = parsed
            .meta
            .and_then(|m| m.pagination)
            .and_then(|p| p.next_page)
            .map(PageToken::PageNumber);

        Ok(CertificatePage {
            certificates: parsed
                .certificates
                .into_iter()
                .map(HetznerCertificate::into_record)
                .collect(),
            next,
        })
    }

    async fn describe_certificate(
        &self,
        cert_id: &str,
    ) -> ProviderResult<HashMap<String, Value>> {
        let certificate = self.get_certificate(cert_id).await?;
        let mut extended = HashMap::new();
        if let Some(fingerprint) = certificate.fingerprint {
            extended.insert("fingerprint".to_string(), Value::from(fingerprint));
        }
        if !certificate.domain_names.is_empty() {
            extended.insert(
                "domain_names".to_string(),
                Value::from(certificate.domain_names),
            );
        }
        Ok(extended)
    }

    async fn create_certificate(
        &self,
        name: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> ProviderResult<UploadResult> {
        debug!(name, "Uploading certificate to Hetzner");

        let request = CreateCertificateRequest {
            name: name.to_string(),
            r#type: "uploaded".to_string(),
            certificate: cert_pem.to_string(),
            private_key: key_pem.to_string(),
        };

        let url = format!("{}/certificates", self.base_url);
        let response = self
            .send("create_certificate", self.client.post(&url).json(&request))
            .await?;
        let response = Self::expect_success("create_certificate", response).await?;
        let parsed: CertificateResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                operation: "create_certificate",
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        debug!(cert_id = parsed.certificate.id, "Certificate uploaded");
        Ok(UploadResult::new(
            parsed.certificate.id.to_string(),
            parsed.certificate.name,
        ))
    }
}

#[async_trait]
impl ListenerEndpoint for HetznerProvider {
    async fn list_listeners(
        &self,
        loadbalancer_id: &str,
        _page: Option<PageToken>,
    ) -> ProviderResult<ListenerPage> {
        let load_balancer = self.get_load_balancer(loadbalancer_id).await?;
        let services = load_balancer["services"].as_array().cloned().unwrap_or_default();

        let listeners = services
            .iter()
            .filter_map(|service| {
                let port = service["listen_port"].as_u64()?;
                let protocol = match service["protocol"].as_str()? {
                    "https" => ListenerProtocol::Https,
                    other => ListenerProtocol::Other(other.to_string()),
                };
                Some(ListenerSummary {
                    id: format!("{}:{}", loadbalancer_id, port),
                    protocol,
                })
            })
            .collect();

        // The services list arrives whole; there is no second page
        Ok(ListenerPage {
            listeners,
            next: None,
        })
    }

    async fn get_listener(&self, listener_id: &str) -> ProviderResult<ListenerDetail> {
        let (lb_id, port) = parse_listener_id(listener_id)?;
        let load_balancer = self.get_load_balancer(&lb_id).await?;
        let service = find_service(&load_balancer, port, listener_id)?;

        let cert_ids: Vec<String> = service["http"]["certificates"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_u64().map(|n| n.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let default_certificate_id = cert_ids.first().cloned();
        let mut sni_bindings = Vec::new();
        for cert_id in cert_ids.iter().skip(1) {
            let identity = self.certificate_identity(cert_id).await?;
            sni_bindings.push(SniBinding {
                binding_id: cert_id.clone(),
                domain: identity.domain,
                certificate_id: cert_id.clone(),
                not_after: identity.not_after,
            });
        }

        Ok(ListenerDetail {
            id: listener_id.to_string(),
            default_certificate_id,
            sni_bindings,
        })
    }

    async fn set_default_certificate(
        &self,
        listener_id: &str,
        cert_id: &str,
    ) -> ProviderResult<()> {
        let id = numeric_cert_id(cert_id)?;
        debug!(listener_id, cert_id, "Setting default certificate");
        self.modify_service_certificates(listener_id, |ids| {
            if ids.is_empty() {
                ids.push(Value::from(id));
            } else {
                ids[0] = Value::from(id);
            }
        })
        .await
    }

    async fn associate_certificate(
        &self,
        listener_id: &str,
        domain: &str,
        cert_id: &str,
    ) -> ProviderResult<()> {
        let id = numeric_cert_id(cert_id)?;
        debug!(listener_id, domain, cert_id, "Associating additional certificate");
        self.modify_service_certificates(listener_id, |ids| {
            if !ids.iter().any(|existing| existing.as_u64() == Some(id)) {
                ids.push(Value::from(id));
            }
        })
        .await
    }

    async fn replace_certificate(
        &self,
        listener_id: &str,
        binding_id: &str,
        cert_id: &str,
    ) -> ProviderResult<()> {
        let old = numeric_cert_id(binding_id)?;
        let new = numeric_cert_id(cert_id)?;
        debug!(listener_id, binding_id, cert_id, "Replacing certificate binding");
        self.modify_service_certificates(listener_id, |ids| {
            for existing in ids.iter_mut() {
                if existing.as_u64() == Some(old) {
                    *existing = Value::from(new);
                }
            }
        })
        .await
    }

    async fn dissociate_certificate(
        &self,
        listener_id: &str,
        binding_id: &str,
    ) -> ProviderResult<()> {
        let old = numeric_cert_id(binding_id)?;
        debug!(listener_id, binding_id, "Dissociating certificate binding");
        self.modify_service_certificates(listener_id, |ids| {
            ids.retain(|existing| existing.as_u64() != Some(old));
        })
        .await
    }
}

impl ProviderClient for HetznerProvider {
    fn name(&self) -> &'static str {
        "hetzner"
    }

    fn listener_endpoint(&self) -> Option<&dyn ListenerEndpoint> {
        Some(self)
    }
}

/// Split a `<loadbalancer-id>:<listen-port>` listener identifier
fn parse_listener_id(listener_id: &str) -> ProviderResult<(String, u64)> {
    let (lb_id, port) = listener_id.rsplit_once(':').ok_or_else(|| {
        ProviderError::Configuration(format!(
            "Hetzner listener id '{}' must be '<loadbalancer-id>:<listen-port>'",
            listener_id
        ))
    })?;
    let port: u64 = port.parse().map_err(|_| {
        ProviderError::Configuration(format!(
            "Hetzner listener id '{}' has a non-numeric port",
            listener_id
        ))
    })?;
    if lb_id.is_empty() {
        return Err(ProviderError::Configuration(format!(
            "Hetzner listener id '{}' has an empty load balancer id",
            listener_id
        )));
    }
    Ok((lb_id.to_string(), port))
}

fn find_service(load_balancer: &Value, port: u64, listener_id: &str) -> ProviderResult<Value> {
    load_balancer["services"]
        .as_array()
        .and_then(|services| {
            services
                .iter()
                .find(|service| service["listen_port"].as_u64() == Some(port))
        })
        .cloned()
        .ok_or_else(|| ProviderError::NotFound {
            resource: "listener",
            identifier: listener_id.to_string(),
        })
}

fn numeric_cert_id(cert_id: &str) -> ProviderResult<u64> {
    cert_id.parse().map_err(|_| {
        ProviderError::Configuration(format!(
            "Hetzner certificate id '{}' is not numeric",
            cert_id
        ))
    })
}

// Hetzner API types

#[derive(Debug, Deserialize)]
struct CertificatesResponse {
    certificates: Vec<HetznerCertificate>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct CertificateResponse {
    certificate: HetznerCertificate,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct HetznerCertificate {
    id: u64,
    name: String,
    #[serde(default)]
    certificate: Option<String>,
    #[serde(default)]
    domain_names: Vec<String>,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    not_valid_before: Option<DateTime<Utc>>,
    #[serde(default)]
    not_valid_after: Option<DateTime<Utc>>,
}

impl HetznerCertificate {
    fn into_record(self) -> RemoteCertificate {
        let mut record = RemoteCertificate::new(self.id.to_string(), self.name);
        record.common_name = self.domain_names.first().cloned();
        record.subject_alt_names = if self.domain_names.is_empty() {
            None
        } else {
            Some(self.domain_names)
        };
        record.not_before = self.not_valid_before;
        record.not_after = self.not_valid_after;
        record.fingerprint = self.fingerprint;
        record.body_pem = self.certificate;
        record
    }
}

#[derive(Debug, Serialize)]
struct CreateCertificateRequest {
    name: String,
    r#type: String,
    certificate: String,
    private_key: String,
}
