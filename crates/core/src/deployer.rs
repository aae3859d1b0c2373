//! SSL deployer: resource binder
//!
//! Resolves a validated deploy target, registers the certificate through
//! the SSL manager, and updates the target so it serves it. Dispatch is
//! an explicit match over the closed resource-kind union. Fan-out across
//! a load balancer's listeners runs sequentially: vendor APIs rate-limit
//! aggressively, and strictly ordered operations keep partial-failure
//! attribution simple. Each iteration step checks the cancellation
//! signal before starting its unit of work.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{DeployConfig, ResourceTarget};
use crate::error::{
    ConfigError, PartialFailure, ProviderError, SubResourceFailure, SyncError, SyncResult,
};
use crate::manager::SslManager;
use crate::material::CertificateMaterial;
use crate::matcher;
use crate::provider::{
    CertificateSlotApi, DomainEndpoint, ListenerDetail, ListenerEndpoint, ProviderClient,
    MAX_LIST_PAGES,
};
use crate::record::{DeployResult, UploadResult};

/// Binds certificate material to one configured vendor resource
pub struct SslDeployer {
    provider: Arc<dyn ProviderClient>,
    config: DeployConfig,
    cancel: CancellationToken,
}

impl SslDeployer {
    pub fn new(provider: Arc<dyn ProviderClient>, config: DeployConfig) -> Self {
        Self {
            provider,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation signal, checked at every pagination page and
    /// per-sub-resource step
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Make the configured resource serve the given certificate
    ///
    /// Validates configuration and parses material before any network
    /// call; upload/registration strictly precedes binding.
    pub async fn deploy(&self, cert_pem: &str, key_pem: &str) -> SyncResult<DeployResult> {
        let target = self.config.validate()?;
        let material = CertificateMaterial::parse(cert_pem, key_pem)?;
        debug!(
            provider = self.provider.name(),
            resource_type = self.config.resource_type.as_str(),
            common_name = %material.common_name(),
            "Starting certificate deploy"
        );

        match target {
            ResourceTarget::CertificateSlot { certificate_id } => {
                self.deploy_to_slot(&material, &certificate_id).await
            }
            ResourceTarget::Listener {
                listener_id,
                sni_domain,
            } => {
                self.deploy_to_listener(&material, &listener_id, sni_domain.as_deref())
                    .await
            }
            ResourceTarget::LoadBalancer {
                loadbalancer_id,
                sni_domain,
            } => {
                self.deploy_to_loadbalancer(&material, &loadbalancer_id, sni_domain.as_deref())
                    .await
            }
            ResourceTarget::Domain { domain } => self.deploy_to_domain(&material, &domain).await,
        }
    }

    fn manager(&self) -> SslManager<dyn ProviderClient> {
        SslManager::with_cancellation(self.provider.clone(), self.cancel.clone())
    }

    fn slot_api(&self) -> Result<&dyn CertificateSlotApi, ConfigError> {
        self.provider
            .certificate_slot()
            .ok_or_else(|| ConfigError::UnsupportedResource {
                provider: self.provider.name().to_string(),
                resource_type: "certificate",
            })
    }

    fn listener_api(&self) -> Result<&dyn ListenerEndpoint, ConfigError> {
        self.provider
            .listener_endpoint()
            .ok_or_else(|| ConfigError::UnsupportedResource {
                provider: self.provider.name().to_string(),
                resource_type: "listener",
            })
    }

    fn domain_api(&self) -> Result<&dyn DomainEndpoint, ConfigError> {
        self.provider
            .domain_endpoint()
            .ok_or_else(|| ConfigError::UnsupportedResource {
                provider: self.provider.name().to_string(),
                resource_type: "domain",
            })
    }

    /// Certificate slot: read-before-write, then upload and point the
    /// slot at the new certificate
    async fn deploy_to_slot(
        &self,
        material: &CertificateMaterial,
        slot_id: &str,
    ) -> SyncResult<DeployResult> {
        let api = self.slot_api()?;

        if let Some(current) = api.get_slot_certificate(slot_id).await? {
            if matcher::comparable(&current) && matcher::matches(material, &current) {
                debug!(slot_id, "Slot already serves this certificate, skipping");
                let mut result = DeployResult::new();
                result.record("skipped", true);
                return Ok(result);
            }
        }

        let upload = self.manager().upload_material(material).await?;
        api.update_slot_certificate(slot_id, &upload.cert_id).await?;
        debug!(slot_id, cert_id = %upload.cert_id, "Slot certificate updated");

        let mut result = DeployResult::new();
        result.record("certificate_id", upload.cert_id);
        Ok(result)
    }

    async fn deploy_to_listener(
        &self,
        material: &CertificateMaterial,
        listener_id: &str,
        sni_domain: Option<&str>,
    ) -> SyncResult<DeployResult> {
        let api = self.listener_api()?;
        let upload = self.manager().upload_material(material).await?;

        self.bind_listener(api, listener_id, &upload, material, sni_domain)
            .await?;

        let mut result = DeployResult::new();
        result.record("certificate_id", upload.cert_id);
        result.record("updated_listeners", vec![listener_id.to_string()]);
        Ok(result)
    }

    /// Load balancer: upload once, then fan out over every TLS listener.
    /// Sub-resource failures are collected, not short-circuited, so one
    /// failing listener never blocks the rest.
    async fn deploy_to_loadbalancer(
        &self,
        material: &CertificateMaterial,
        loadbalancer_id: &str,
        sni_domain: Option<&str>,
    ) -> SyncResult<DeployResult> {
        let api = self.listener_api()?;
        let upload = self.manager().upload_material(material).await?;

        let mut failures: Vec<SubResourceFailure> = Vec::new();
        let mut updated: Vec<String> = Vec::new();
        let mut page_token = None;
        let mut pages_scanned: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = api.list_listeners(loadbalancer_id, page_token.take()).await?;
            for listener in &page.listeners {
                if self.cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                if !listener.protocol.is_tls() {
                    trace!(listener_id = %listener.id, "Not a TLS listener, skipping");
                    continue;
                }
                match self
                    .bind_listener(api, &listener.id, &upload, material, sni_domain)
                    .await
                {
                    Ok(()) => updated.push(listener.id.clone()),
                    Err(error) => {
                        warn!(
                            listener_id = %listener.id,
                            %error,
                            "Listener update failed, continuing fan-out"
                        );
                        failures.push(SubResourceFailure {
                            target: format!("listener '{}'", listener.id),
                            error,
                        });
                    }
                }
            }

            pages_scanned += 1;
            match page.next {
                Some(next) if pages_scanned < MAX_LIST_PAGES => page_token = Some(next),
                Some(_) => {
                    warn!(pages = pages_scanned, "Listener listing did not terminate");
                    break;
                }
                None => break,
            }
        }

        if !failures.is_empty() {
            return Err(SyncError::Partial(PartialFailure { failures }));
        }

        let mut result = DeployResult::new();
        result.record("certificate_id", upload.cert_id);
        result.record("updated_listeners", updated);
        Ok(result)
    }

    /// One listener: default-certificate swap, or SNI bookkeeping when a
    /// domain is targeted
    async fn bind_listener(
        &self,
        api: &dyn ListenerEndpoint,
        listener_id: &str,
        upload: &UploadResult,
        material: &CertificateMaterial,
        sni_domain: Option<&str>,
    ) -> Result<(), ProviderError> {
        let detail = api.get_listener(listener_id).await?;
        match sni_domain {
            None => {
                if detail.default_certificate_id.as_deref() == Some(upload.cert_id.as_str()) {
                    debug!(listener_id, "Default certificate already current, skipping");
                    return Ok(());
                }
                api.set_default_certificate(listener_id, &upload.cert_id)
                    .await?;
                debug!(listener_id, cert_id = %upload.cert_id, "Default certificate updated");
                Ok(())
            }
            Some(domain) => self.bind_sni(api, &detail, upload, material, domain).await,
        }
    }

    /// Associate/dissociate bookkeeping for SNI-keyed additional
    /// certificates, never a blind overwrite
    async fn bind_sni(
        &self,
        api: &dyn ListenerEndpoint,
        detail: &ListenerDetail,
        upload: &UploadResult,
        material: &CertificateMaterial,
        domain: &str,
    ) -> Result<(), ProviderError> {
        let already_bound = detail
            .sni_bindings
            .iter()
            .any(|b| b.certificate_id == upload.cert_id);

        if already_bound {
            debug!(
                listener_id = %detail.id,
                domain,
                "Certificate already associated, skipping"
            );
        } else if let Some(existing) = detail
            .sni_bindings
            .iter()
            .find(|b| b.domain.eq_ignore_ascii_case(domain))
        {
            debug!(
                listener_id = %detail.id,
                binding_id = %existing.binding_id,
                domain,
                "Replacing SNI binding with new certificate"
            );
            api.replace_certificate(&detail.id, &existing.binding_id, &upload.cert_id)
                .await?;
        } else {
            debug!(listener_id = %detail.id, domain, "Associating certificate under SNI domain");
            api.associate_certificate(&detail.id, domain, &upload.cert_id)
                .await?;
        }

        // Stale cleanup: only bindings whose certificate is known-expired
        // and whose domain the new certificate covers. Unknown expiry is
        // left alone.
        let now = Utc::now();
        for binding in &detail.sni_bindings {
            if binding.certificate_id == upload.cert_id {
                continue;
            }
            if binding.domain.eq_ignore_ascii_case(domain) {
                continue;
            }
            let expired = matches!(binding.not_after, Some(not_after) if not_after < now);
            if expired && material.covers_hostname(&binding.domain) {
                debug!(
                    listener_id = %detail.id,
                    binding_id = %binding.binding_id,
                    domain = %binding.domain,
                    "Dissociating expired SNI binding superseded by this certificate"
                );
                api.dissociate_certificate(&detail.id, &binding.binding_id)
                    .await?;
            }
        }

        Ok(())
    }

    /// CDN / API-gateway domain: resolve to the vendor's internal id,
    /// read the full configuration, merge the certificate reference in,
    /// and submit the merged object back (the update API replaces, it
    /// does not patch)
    async fn deploy_to_domain(
        &self,
        material: &CertificateMaterial,
        domain: &str,
    ) -> SyncResult<DeployResult> {
        let api = self.domain_api()?;

        let current = api
            .find_domain(domain)
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                resource: "domain",
                identifier: domain.to_string(),
            })?;

        let upload = self.manager().upload_material(material).await?;

        if current.certificate_id.as_deref() == Some(upload.cert_id.as_str()) {
            debug!(domain, "Domain already references this certificate, skipping");
            let mut result = DeployResult::new();
            result.record("skipped", true);
            return Ok(result);
        }

        let mut merged = current;
        merged.certificate_id = Some(upload.cert_id.clone());
        api.update_domain(&merged).await?;
        debug!(domain, domain_id = %merged.domain_id, cert_id = %upload.cert_id, "Domain certificate updated");

        let mut result = DeployResult::new();
        result.record("certificate_id", upload.cert_id);
        result.record("domain_id", merged.domain_id);
        Ok(result)
    }
}
