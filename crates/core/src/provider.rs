//! Provider client capability traits
//!
//! Each vendor integration implements a narrow set of list/get/create/
//! update primitives behind these traits; the manager and deployer depend
//! only on them, never on a vendor's concrete types. Transport concerns
//! (signing, retries, timeouts) stay inside the implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProviderResult;
use crate::record::{RemoteCertificate, UploadResult};

/// Upper bound on pages consumed from any vendor listing, guarding
/// against cursors that never terminate
pub(crate) const MAX_LIST_PAGES: u32 = 1_000;

/// Position within a vendor's native pagination model
///
/// Providers hand back whichever variant their API speaks; callers treat
/// it as opaque "advance" state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// Offset + limit style: next record offset
    Offset(u64),
    /// Page + per-page style: next page number
    PageNumber(u32),
    /// Opaque continuation token
    Cursor(String),
}

/// One page of certificate records
#[derive(Debug, Default)]
pub struct CertificatePage {
    pub certificates: Vec<RemoteCertificate>,
    /// `None` when the listing is exhausted
    pub next: Option<PageToken>,
}

/// Vendor certificate store: the surface the upload/dedup registry needs
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// List uploaded certificates, one vendor-native page at a time
    ///
    /// `page` is `None` for the first call and the previous page's `next`
    /// token afterwards.
    async fn list_certificates(&self, page: Option<PageToken>)
        -> ProviderResult<CertificatePage>;

    /// Vendor-specific extra handles a deploy step additionally needs
    /// (e.g. an alternate certificate reference format)
    ///
    /// The default covers vendors whose certificate identifier is the only
    /// handle there is.
    async fn describe_certificate(
        &self,
        cert_id: &str,
    ) -> ProviderResult<HashMap<String, serde_json::Value>> {
        let _ = cert_id;
        Ok(HashMap::new())
    }

    /// Create/import a certificate object under `name`
    async fn create_certificate(
        &self,
        name: &str,
        cert_pem: &str,
        key_pem: &str,
    ) -> ProviderResult<UploadResult>;
}

/// Listener protocol, used to filter load-balancer fan-out to TLS traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerProtocol {
    Https,
    TcpSsl,
    Quic,
    Other(String),
}

impl ListenerProtocol {
    /// Whether this listener terminates TLS and therefore carries certificates
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Https | Self::TcpSsl | Self::Quic)
    }
}

/// Listing entry for a load balancer's listener
#[derive(Debug, Clone)]
pub struct ListenerSummary {
    pub id: String,
    pub protocol: ListenerProtocol,
}

/// One page of listeners
#[derive(Debug, Default)]
pub struct ListenerPage {
    pub listeners: Vec<ListenerSummary>,
    pub next: Option<PageToken>,
}

/// An additional certificate bound to a listener under an SNI domain
#[derive(Debug, Clone)]
pub struct SniBinding {
    /// Vendor identifier for the binding itself
    pub binding_id: String,
    /// Server name the binding serves
    pub domain: String,
    /// Identifier of the bound certificate
    pub certificate_id: String,
    /// Expiry of the bound certificate, where the vendor reports it
    pub not_after: Option<DateTime<Utc>>,
}

/// Full certificate state of one listener
#[derive(Debug, Clone)]
pub struct ListenerDetail {
    pub id: String,
    /// The listener's default certificate, if one is set
    pub default_certificate_id: Option<String>,
    /// Additional SNI-keyed certificates
    pub sni_bindings: Vec<SniBinding>,
}

/// Listener / load-balancer binding surface
#[async_trait]
pub trait ListenerEndpoint: Send + Sync {
    /// List the listeners of a load balancer, one page at a time
    async fn list_listeners(
        &self,
        loadbalancer_id: &str,
        page: Option<PageToken>,
    ) -> ProviderResult<ListenerPage>;

    /// Current certificate state of a listener
    async fn get_listener(&self, listener_id: &str) -> ProviderResult<ListenerDetail>;

    /// Set the listener's default certificate
    async fn set_default_certificate(
        &self,
        listener_id: &str,
        cert_id: &str,
    ) -> ProviderResult<()>;

    /// Bind an additional certificate under an SNI domain
    async fn associate_certificate(
        &self,
        listener_id: &str,
        domain: &str,
        cert_id: &str,
    ) -> ProviderResult<()>;

    /// Point an existing SNI binding at a different certificate
    async fn replace_certificate(
        &self,
        listener_id: &str,
        binding_id: &str,
        cert_id: &str,
    ) -> ProviderResult<()>;

    /// Remove an SNI binding
    async fn dissociate_certificate(
        &self,
        listener_id: &str,
        binding_id: &str,
    ) -> ProviderResult<()>;
}

/// A resource with exactly one active certificate at a time
#[async_trait]
pub trait CertificateSlotApi: Send + Sync {
    /// Current slot contents, `None` when the slot is empty or the vendor
    /// offers no read-before-write
    async fn get_slot_certificate(
        &self,
        slot_id: &str,
    ) -> ProviderResult<Option<RemoteCertificate>>;

    /// Point the slot at a different certificate
    async fn update_slot_certificate(&self, slot_id: &str, cert_id: &str) -> ProviderResult<()>;
}

/// Full configuration of a CDN / API-gateway custom domain
///
/// Many vendor update endpoints are replace, not patch: any field omitted
/// from the update reverts to a default. `settings` therefore carries the
/// vendor's remaining configuration verbatim so it can be submitted back
/// unchanged.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Vendor-internal identifier the update API is keyed by
    pub domain_id: String,
    /// The human domain string
    pub domain: String,
    /// Currently referenced certificate, if any
    pub certificate_id: Option<String>,
    /// Remaining vendor configuration, round-tripped untouched
    pub settings: serde_json::Value,
}

/// CDN / API-gateway custom-domain surface
#[async_trait]
pub trait DomainEndpoint: Send + Sync {
    /// Resolve a human domain to its full current configuration
    ///
    /// Implementations typically list/search, since vendor APIs are keyed
    /// by internal id rather than by the domain string.
    async fn find_domain(&self, domain: &str) -> ProviderResult<Option<DomainConfig>>;

    /// Submit a full merged configuration (replace semantics)
    async fn update_domain(&self, config: &DomainConfig) -> ProviderResult<()>;
}

/// Umbrella trait a vendor integration exposes to the deployer
///
/// Every provider is a certificate store; the remaining capabilities are
/// optional and advertised through the accessor methods. Deploying to a
/// resource kind whose capability is absent is a configuration error,
/// reported before any network call.
pub trait ProviderClient: CertificateStore {
    /// Vendor name for logs and error messages
    fn name(&self) -> &'static str;

    fn certificate_slot(&self) -> Option<&dyn CertificateSlotApi> {
        None
    }

    fn listener_endpoint(&self) -> Option<&dyn ListenerEndpoint> {
        None
    }

    fn domain_endpoint(&self) -> Option<&dyn DomainEndpoint> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_protocols() {
        assert!(ListenerProtocol::Https.is_tls());
        assert!(ListenerProtocol::TcpSsl.is_tls());
        assert!(ListenerProtocol::Quic.is_tls());
        assert!(!ListenerProtocol::Other("http".to_string()).is_tls());
    }
}
