//! Vendor provider clients for the certificate synchronization core
//!
//! Each module implements the capability traits from `certsync-core` for
//! one vendor API:
//!
//! - [`hetzner`]: Hetzner Cloud, uploaded certificates and load-balancer
//!   service bindings
//! - [`webhook`]: a generic HTTP adapter contract for infrastructure
//!   without a first-class integration
//!
//! [`config::create_provider`] builds a client from declarative
//! configuration; [`config::create_deployer`] pairs it with a validated
//! deploy target.

pub mod config;
pub mod credentials;
pub mod hetzner;
pub mod webhook;

pub use config::{create_deployer, create_provider, ProviderConfig, ProviderKind};
pub use credentials::{CredentialLoader, Credentials};
pub use hetzner::HetznerProvider;
pub use webhook::WebhookProvider;
