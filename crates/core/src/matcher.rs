//! Certificate identity matcher
//!
//! Compares candidate material against a vendor-reported certificate
//! record using a short-circuiting tiered strategy. Vendors never expose
//! the same identity fields uniformly, so no single criterion suffices:
//! every tier the remote record lacks is treated as inconclusive, never
//! as a mismatch, and any evaluated tier that fails rejects the pair.
//!
//! Tier order, cheapest and most available first:
//!
//! 1. full PEM body: byte equality is a fast accept; inequality falls
//!    through to structural comparison because vendors re-serialize
//! 2. not-before / not-after timestamps
//! 3. common name (case-insensitive) and the SAN list
//! 4. content fingerprint, the strongest discriminator

use tracing::trace;

use crate::material::{self, CertificateMaterial};
use crate::record::RemoteCertificate;

/// Whether the record carries enough signal to be worth comparing
pub fn comparable(remote: &RemoteCertificate) -> bool {
    remote.body_pem.is_some()
        || remote.not_before.is_some()
        || remote.not_after.is_some()
        || remote.common_name.is_some()
        || remote.subject_alt_names.is_some()
        || remote.fingerprint.is_some()
}

/// Tiered identity comparison
///
/// Returns `true` only when at least one tier was evaluated and every
/// evaluated tier passed.
pub fn matches(candidate: &CertificateMaterial, remote: &RemoteCertificate) -> bool {
    // Tier 1: byte-exact body
    if let Some(body) = &remote.body_pem {
        if normalized_pem(body) == normalized_pem(candidate.cert_pem()) {
            trace!(cert_id = %remote.id, "Matched on byte-exact PEM body");
            return true;
        }
    }

    let remote = enrich_from_body(remote);
    let mut evaluated = false;

    // Tier 2: validity timestamps
    if let Some(not_before) = remote.not_before {
        evaluated = true;
        if not_before != candidate.not_before() {
            return false;
        }
    }
    if let Some(not_after) = remote.not_after {
        evaluated = true;
        if not_after != candidate.not_after() {
            return false;
        }
    }

    // Tier 3: common name and SAN list
    if let Some(common_name) = &remote.common_name {
        evaluated = true;
        if !common_name.eq_ignore_ascii_case(candidate.common_name()) {
            return false;
        }
    }
    if let Some(sans) = &remote.subject_alt_names {
        evaluated = true;
        if !san_lists_equal(sans, candidate.subject_alt_names()) {
            return false;
        }
    }

    // Tier 4: fingerprint
    if let Some(fingerprint) = &remote.fingerprint {
        let theirs = normalized_fingerprint(fingerprint);
        let ours = candidate.fingerprint();
        // Vendors report different digest algorithms; a length mismatch
        // means incomparable, not unequal
        if theirs.len() == ours.len() {
            evaluated = true;
            if theirs != ours {
                return false;
            }
        }
    }

    if evaluated {
        trace!(cert_id = %remote.id, "All evaluated tiers passed");
    }
    evaluated
}

/// Fill missing identity fields by parsing the remote PEM body, if any
///
/// Re-serialized bodies fail the byte-equality fast path but still carry
/// the full identity; parsing recovers it. An unparseable body is simply
/// ignored.
fn enrich_from_body(remote: &RemoteCertificate) -> RemoteCertificate {
    let mut enriched = remote.clone();
    let Some(body) = &remote.body_pem else {
        return enriched;
    };
    let Ok(info) = material::leaf_info(body) else {
        return enriched;
    };

    if enriched.common_name.is_none() && !info.common_name.is_empty() {
        enriched.common_name = Some(info.common_name);
    }
    if enriched.subject_alt_names.is_none() && !info.subject_alt_names.is_empty() {
        enriched.subject_alt_names = Some(info.subject_alt_names);
    }
    enriched.not_before.get_or_insert(info.not_before);
    enriched.not_after.get_or_insert(info.not_after);
    enriched.fingerprint.get_or_insert(info.fingerprint);
    enriched
}

/// SAN equality as a case-insensitive multiset
///
/// Vendors that preserve order still compare equal; vendors that reorder
/// must not produce a false mismatch.
fn san_lists_equal(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<String> = a.iter().map(|s| s.to_ascii_lowercase()).collect();
    let mut b: Vec<String> = b.iter().map(|s| s.to_ascii_lowercase()).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

fn normalized_pem(pem: &str) -> String {
    pem.split_whitespace().collect()
}

fn normalized_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| *c != ':')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
