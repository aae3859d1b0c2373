//! Error types for the certificate synchronization core
//!
//! Errors are split per concern so callers can distinguish configuration
//! mistakes (fail fast, never retried) from certificate parse failures and
//! vendor transport errors. Fan-out failures across sub-resources are
//! collected into a single [`PartialFailure`] rather than short-circuiting.

use thiserror::Error;

/// Result type for the exported `upload`/`deploy` operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for provider client calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Deploy/upload configuration errors, detected before any network call
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required companion field for the resource type is missing or empty
    #[error("Missing required field '{field}' for resource type '{resource_type}'")]
    MissingField {
        resource_type: &'static str,
        field: &'static str,
    },

    /// A field is present but unusable
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The provider does not implement the capability this resource type needs
    #[error("Provider '{provider}' does not support resource type '{resource_type}'")]
    UnsupportedResource {
        provider: String,
        resource_type: &'static str,
    },

    /// Credential loading failed
    #[error("Failed to load credentials: {0}")]
    Credentials(String),
}

/// Certificate or private key material could not be decoded
#[derive(Debug, Error)]
pub enum MaterialError {
    /// Certificate PEM decoding failed
    #[error("Failed to parse certificate PEM: {0}")]
    CertificatePem(String),

    /// PEM decoded but contained no certificate block
    #[error("Certificate PEM contains no certificate block")]
    EmptyChain,

    /// DER-level X.509 parsing failed
    #[error("Failed to parse X.509 certificate: {0}")]
    X509(String),

    /// Private key PEM decoding failed
    #[error("Failed to parse private key PEM: {0}")]
    PrivateKey(String),
}

/// A provider client call failed
///
/// Wraps the originating vendor operation name so callers can log the
/// failure usefully. Retry policy belongs to the provider client or a
/// higher orchestration layer, never to this core.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed with the vendor
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A named resource could not be resolved
    #[error("{resource} '{identifier}' not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },

    /// Vendor API returned an error or the transport failed
    #[error("Vendor operation '{operation}' failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// Request timed out
    #[error("Vendor operation '{operation}' timed out")]
    Timeout { operation: &'static str },

    /// Provider-side configuration problem (bad endpoint, unusable identifier)
    #[error("Invalid provider configuration: {0}")]
    Configuration(String),
}

/// One failed sub-resource update within a fan-out
#[derive(Debug)]
pub struct SubResourceFailure {
    /// Human-readable target description, e.g. `listener 'lst-2'`
    pub target: String,
    /// The underlying provider error
    pub error: ProviderError,
}

/// One or more (but not necessarily all) sub-resource updates failed
///
/// Successes are not rolled back; each failure names its target so the
/// aggregate stays attributable.
#[derive(Debug)]
pub struct PartialFailure {
    pub failures: Vec<SubResourceFailure>,
}

impl std::fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sub-resource update(s) failed: ",
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.target, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

/// Top-level error for `upload` and `deploy`
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error, raised before any network call
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Certificate material could not be decoded
    #[error("Invalid certificate material: {0}")]
    InvalidCertificate(#[from] MaterialError),

    /// A provider client call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Some sub-resource updates failed during a fan-out
    #[error(transparent)]
    Partial(#[from] PartialFailure),

    /// The cancellation signal fired between units of work
    #[error("Operation cancelled")]
    Cancelled,
}
