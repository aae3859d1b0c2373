//! Certificate synchronization core
//!
//! Automates the "make this resource serve this certificate" half of the
//! TLS lifecycle across heterogeneous hosting targets: CDN domains,
//! load-balancer listeners, WAF certificate slots, API-gateway custom
//! domains. Vendor APIs disagree about everything (pagination models,
//! which identity fields a certificate listing exposes, whether updates
//! patch or replace), so the core presents one uniform contract and
//! pushes vendor divergence behind narrow capability traits.
//!
//! # Architecture
//!
//! - [`CertificateMaterial`]: parsed certificate + key with derived
//!   identity attributes
//! - [`matcher`]: tiered equivalence comparison against vendor records,
//!   degrading gracefully over whatever fields a vendor exposes
//! - [`SslManager`]: upload/dedup registry that reuses an equivalent
//!   remote certificate object or creates one, at most one per distinct
//!   certificate under sequential use
//! - [`SslDeployer`]: resolves a validated [`ResourceTarget`] and binds
//!   the certificate: slot update, listener default swap, SNI
//!   associate/replace/dissociate bookkeeping, load-balancer fan-out,
//!   domain read-merge-replace
//! - [`provider`]: the capability traits every vendor client implements
//!
//! Within one deploy, "resolve → upload/register → bind" is strictly
//! ordered; fan-out across sub-resources is sequential, exhaustive, and
//! fault-isolated, with failures joined into a [`PartialFailure`].
//!
//! # Example
//!
//! ```ignore
//! let provider: Arc<dyn ProviderClient> = build_vendor_client()?;
//! let config: DeployConfig = serde_json::from_str(
//!     r#"{"resourceType": "loadbalancer", "loadbalancerId": "lb-1"}"#,
//! )?;
//! let deployer = SslDeployer::new(provider, config);
//! deployer.deploy(&cert_pem, &key_pem).await?;
//! ```
//!
//! Logging goes through `tracing`; the crate never installs a
//! subscriber, so embedders own the sink and the default is a no-op.

pub mod config;
pub mod deployer;
pub mod error;
pub mod manager;
pub mod material;
pub mod matcher;
pub mod provider;
pub mod record;

pub use config::{DeployConfig, ResourceTarget, ResourceType};
pub use deployer::SslDeployer;
pub use error::{
    ConfigError, MaterialError, PartialFailure, ProviderError, ProviderResult, SubResourceFailure,
    SyncError, SyncResult,
};
pub use manager::SslManager;
pub use material::CertificateMaterial;
pub use provider::{
    CertificatePage, CertificateSlotApi, CertificateStore, DomainConfig, DomainEndpoint,
    ListenerDetail, ListenerEndpoint, ListenerPage, ListenerProtocol, ListenerSummary, PageToken,
    ProviderClient, SniBinding,
};
pub use record::{DeployResult, RemoteCertificate, UploadResult};
