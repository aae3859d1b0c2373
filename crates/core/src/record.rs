//! Result and record types shared across providers

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vendor's representation of a previously uploaded certificate object
///
/// Only `id` and `name` are guaranteed; every identity field is optional
/// because vendor listing endpoints expose wildly different subsets. The
/// matcher degrades gracefully across whatever is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCertificate {
    /// Vendor-assigned identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Subject common name, if the vendor reports it
    #[serde(default)]
    pub common_name: Option<String>,
    /// Subject alternative names, in vendor order where preserved
    #[serde(default)]
    pub subject_alt_names: Option<Vec<String>>,
    /// Validity start
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
    /// Validity end
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
    /// Content digest in whatever form the vendor reports (hex, colon-hex)
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Full PEM body, where the vendor returns it
    #[serde(default)]
    pub body_pem: Option<String>,
}

impl RemoteCertificate {
    /// A record carrying only the guaranteed fields
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            common_name: None,
            subject_alt_names: None,
            not_before: None,
            not_after: None,
            fingerprint: None,
            body_pem: None,
        }
    }
}

/// Handle to a remote certificate object, returned by upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    /// Vendor-scoped certificate identifier
    pub cert_id: String,
    /// Human-readable name
    pub cert_name: String,
    /// Vendor-specific extra handles some deploy endpoints additionally need
    #[serde(default)]
    pub extended: HashMap<String, serde_json::Value>,
}

impl UploadResult {
    pub fn new(cert_id: impl Into<String>, cert_name: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            cert_name: cert_name.into(),
            extended: HashMap::new(),
        }
    }
}

/// Marker of a completed deploy, plus optional vendor diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployResult {
    /// Provider-specific diagnostic data (updated resource ids etc.)
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl DeployResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a diagnostic entry
    pub fn record(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.details.insert(key.into(), value.into());
    }
}
