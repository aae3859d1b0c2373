//! SSL manager: upload/dedup registry
//!
//! Given certificate material, returns a handle to an already-existing
//! equivalent remote certificate object, or uploads a new one. Under
//! sequential single-flight use this yields at most one remote object per
//! distinct certificate per account. No locking guards the list-then-
//! create window: concurrent callers against the same account can both
//! decide "not found" and both create, which is accepted best-effort
//! behavior; callers needing more add external mutual exclusion keyed by
//! (account, fingerprint).

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::material::CertificateMaterial;
use crate::matcher;
use crate::provider::{CertificateStore, MAX_LIST_PAGES};
use crate::record::UploadResult;

/// Prefix for generated certificate names
const UPLOAD_NAME_PREFIX: &str = "certsync";

/// Upload/dedup registry over one vendor certificate store
pub struct SslManager<S: CertificateStore + ?Sized> {
    store: Arc<S>,
    cancel: CancellationToken,
}

impl<S: CertificateStore + ?Sized> SslManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Like [`SslManager::new`], with a cancellation signal checked at
    /// every page boundary
    pub fn with_cancellation(store: Arc<S>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Upload certificate material, reusing an equivalent remote object
    /// when the vendor already holds one
    pub async fn upload(&self, cert_pem: &str, key_pem: &str) -> SyncResult<UploadResult> {
        let material = CertificateMaterial::parse(cert_pem, key_pem)?;
        self.upload_material(&material).await
    }

    /// [`SslManager::upload`] over already-parsed material
    pub async fn upload_material(&self, material: &CertificateMaterial) -> SyncResult<UploadResult> {
        if let Some(existing) = self.find_existing(material).await? {
            return Ok(existing);
        }

        let name = unique_certificate_name();
        debug!(
            name = %name,
            common_name = %material.common_name(),
            "No equivalent remote certificate, creating"
        );
        let result = self
            .store
            .create_certificate(&name, material.cert_pem(), material.key_pem())
            .await?;
        debug!(cert_id = %result.cert_id, cert_name = %result.cert_name, "Certificate created");
        Ok(result)
    }

    /// Page through the vendor listing, returning the first record the
    /// matcher accepts
    async fn find_existing(
        &self,
        material: &CertificateMaterial,
    ) -> SyncResult<Option<UploadResult>> {
        let mut page_token = None;
        let mut pages_scanned: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = self.store.list_certificates(page_token.take()).await?;
            for remote in &page.certificates {
                if !matcher::comparable(remote) {
                    continue;
                }
                if matcher::matches(material, remote) {
                    debug!(
                        cert_id = %remote.id,
                        cert_name = %remote.name,
                        "Reusing existing remote certificate"
                    );
                    let extended = self.store.describe_certificate(&remote.id).await?;
                    let mut result = UploadResult::new(remote.id.clone(), remote.name.clone());
                    result.extended = extended;
                    return Ok(Some(result));
                }
            }

            pages_scanned += 1;
            match page.next {
                Some(next) if pages_scanned < MAX_LIST_PAGES => page_token = Some(next),
                Some(_) => {
                    warn!(
                        pages = pages_scanned,
                        "Certificate listing did not terminate, stopping scan"
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(None)
    }
}

/// Generated name: fixed prefix plus a high-resolution timestamp
///
/// Unique per call to avoid name collisions across repeated uploads;
/// duplicate-content avoidance is the matcher's job, not the name's.
fn unique_certificate_name() -> String {
    format!("{}-{}", UPLOAD_NAME_PREFIX, Utc::now().format("%Y%m%d%H%M%S%9f"))
}
