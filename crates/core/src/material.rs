//! Certificate material parsing
//!
//! The unit of work: an X.509 leaf certificate plus its private key, both
//! handed in as PEM text. Identity attributes are derived once at parse
//! time and never mutated; the raw PEM is retained for byte-exact
//! comparison and for vendors that ingest it verbatim.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;
use x509_parser::time::ASN1Time;

use crate::error::MaterialError;

/// Parsed certificate + key pair with derived identity attributes
#[derive(Debug, Clone)]
pub struct CertificateMaterial {
    cert_pem: String,
    key_pem: String,
    common_name: String,
    subject_alt_names: Vec<String>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    serial: String,
    fingerprint: String,
}

/// Identity fields of a leaf certificate, extracted from PEM
///
/// Shared between [`CertificateMaterial::parse`] and the matcher, which
/// uses it to enrich vendor records that only expose a PEM body.
#[derive(Debug, Clone)]
pub(crate) struct LeafInfo {
    pub common_name: String,
    pub subject_alt_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
    /// Lowercase hex SHA-256 of the leaf DER
    pub fingerprint: String,
}

/// Parse the first CERTIFICATE block of a PEM bundle into identity fields
pub(crate) fn leaf_info(cert_pem: &str) -> Result<LeafInfo, MaterialError> {
    let blocks = pem::parse_many(cert_pem.as_bytes())
        .map_err(|e| MaterialError::CertificatePem(e.to_string()))?;
    let leaf = blocks
        .iter()
        .find(|b| b.tag() == "CERTIFICATE")
        .ok_or(MaterialError::EmptyChain)?;

    let (_, cert) = parse_x509_certificate(leaf.contents())
        .map_err(|e| MaterialError::X509(e.to_string()))?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut subject_alt_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for general_name in &san.value.general_names {
            if let GeneralName::DNSName(name) = general_name {
                subject_alt_names.push((*name).to_string());
            }
        }
    }

    let not_before = asn1_to_utc(cert.validity().not_before)?;
    let not_after = asn1_to_utc(cert.validity().not_after)?;
    let serial = cert.raw_serial_as_string();
    let fingerprint = hex::encode(Sha256::digest(leaf.contents()));

    Ok(LeafInfo {
        common_name,
        subject_alt_names,
        not_before,
        not_after,
        serial,
        fingerprint,
    })
}

fn asn1_to_utc(time: ASN1Time) -> Result<DateTime<Utc>, MaterialError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| MaterialError::X509(format!("validity timestamp out of range: {time}")))
}

impl CertificateMaterial {
    /// Parse certificate and private key PEM into material
    ///
    /// The private key is validated as a PEM private-key block but not
    /// cryptographically checked against the certificate; vendors reject
    /// mismatched pairs on upload.
    pub fn parse(cert_pem: &str, key_pem: &str) -> Result<Self, MaterialError> {
        let info = leaf_info(cert_pem)?;

        let key_block = pem::parse(key_pem.as_bytes())
            .map_err(|e| MaterialError::PrivateKey(e.to_string()))?;
        if !key_block.tag().contains("PRIVATE KEY") {
            return Err(MaterialError::PrivateKey(format!(
                "unexpected PEM tag '{}'",
                key_block.tag()
            )));
        }

        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pem: key_pem.to_string(),
            common_name: info.common_name,
            subject_alt_names: info.subject_alt_names,
            not_before: info.not_before,
            not_after: info.not_after,
            serial: info.serial,
            fingerprint: info.fingerprint,
        })
    }

    /// Full encoded certificate (leaf plus any intermediates)
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Encoded private key
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Subject common name (empty if the certificate carries none)
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// DNS subject alternative names, in certificate order
    pub fn subject_alt_names(&self) -> &[String] {
        &self.subject_alt_names
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Serial number as colon-separated hex
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Lowercase hex SHA-256 of the leaf DER
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the certificate validity window has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    /// Whether this certificate is valid for `hostname`
    ///
    /// Checks SANs (falling back to the common name when the certificate
    /// carries no SANs) with single-label wildcard semantics: a
    /// `*.example.com` entry covers `x.example.com` but not `example.com`
    /// or `a.b.example.com`.
    pub fn covers_hostname(&self, hostname: &str) -> bool {
        if self.subject_alt_names.is_empty() {
            return hostname_matches(&self.common_name, hostname);
        }
        self.subject_alt_names
            .iter()
            .any(|pattern| hostname_matches(pattern, hostname))
    }

    /// Split the certificate bundle into leaf and intermediate PEM
    ///
    /// Some vendor import endpoints take the leaf and the chain as
    /// separate fields. The intermediates string is empty when the bundle
    /// contains only the leaf.
    pub fn split_chain(&self) -> Result<(String, String), MaterialError> {
        let blocks = pem::parse_many(self.cert_pem.as_bytes())
            .map_err(|e| MaterialError::CertificatePem(e.to_string()))?;
        let mut certs = blocks.iter().filter(|b| b.tag() == "CERTIFICATE");
        let leaf = certs.next().ok_or(MaterialError::EmptyChain)?;
        let intermediates: String = certs.map(pem::encode).collect();
        Ok((pem::encode(leaf), intermediates))
    }
}

/// Single-label wildcard hostname match, case-insensitive
pub(crate) fn hostname_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let hostname = hostname.to_ascii_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        }
    } else {
        pattern == hostname
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Helpers for minting throwaway certificates in tests

    /// Issue a self-signed certificate for `domains` with the given
    /// validity window, returning (cert_pem, key_pem)
    pub(crate) fn issue(
        domains: &[&str],
        not_before: (i32, u8, u8),
        not_after: (i32, u8, u8),
    ) -> (String, String) {
        let names: Vec<String> = domains.iter().map(|d| d.to_string()).collect();
        let mut params = rcgen::CertificateParams::new(names).expect("params");
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, domains[0]);
        params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        let key = rcgen::KeyPair::generate().expect("keypair");
        let cert = params.self_signed(&key).expect("self-signed cert");
        (cert.pem(), key.serialize_pem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn parse_derives_identity_fields() {
        let (cert_pem, key_pem) =
            testutil::issue(&["example.com", "*.example.com"], (2024, 1, 1), (2025, 1, 1));
        let material = CertificateMaterial::parse(&cert_pem, &key_pem).unwrap();

        assert_eq!(material.common_name(), "example.com");
        assert_eq!(
            material.subject_alt_names(),
            &["example.com".to_string(), "*.example.com".to_string()]
        );
        assert_eq!(
            material.not_before(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            material.not_after(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(material.fingerprint().len(), 64);
        assert!(!material.serial().is_empty());
    }

    #[test]
    fn parse_rejects_garbage_certificate() {
        // Non-PEM text decodes as zero blocks, so the failure is the
        // missing certificate, not a PEM syntax error
        let err = CertificateMaterial::parse("not a pem", "also not a pem").unwrap_err();
        assert!(matches!(err, MaterialError::EmptyChain));
    }

    #[test]
    fn parse_rejects_malformed_pem_block() {
        let mangled = "-----BEGIN CERTIFICATE-----\n!!not base64!!\n-----END CERTIFICATE-----\n";
        let err = CertificateMaterial::parse(mangled, "irrelevant").unwrap_err();
        assert!(matches!(err, MaterialError::CertificatePem(_)));
    }

    #[test]
    fn parse_rejects_key_with_wrong_tag() {
        let (cert_pem, _) = testutil::issue(&["example.com"], (2024, 1, 1), (2025, 1, 1));
        // A certificate block is not a private key
        let err = CertificateMaterial::parse(&cert_pem, &cert_pem).unwrap_err();
        assert!(matches!(err, MaterialError::PrivateKey(_)));
    }

    #[test]
    fn covers_hostname_wildcard_is_single_label() {
        let (cert_pem, key_pem) =
            testutil::issue(&["example.com", "*.example.com"], (2024, 1, 1), (2025, 1, 1));
        let material = CertificateMaterial::parse(&cert_pem, &key_pem).unwrap();

        assert!(material.covers_hostname("example.com"));
        assert!(material.covers_hostname("x.example.com"));
        assert!(material.covers_hostname("X.EXAMPLE.COM"));
        assert!(!material.covers_hostname("a.b.example.com"));
        assert!(!material.covers_hostname("other.com"));
    }

    #[test]
    fn split_chain_without_intermediates() {
        let (cert_pem, key_pem) = testutil::issue(&["example.com"], (2024, 1, 1), (2025, 1, 1));
        let material = CertificateMaterial::parse(&cert_pem, &key_pem).unwrap();
        let (leaf, intermediates) = material.split_chain().unwrap();
        assert!(leaf.contains("BEGIN CERTIFICATE"));
        assert!(intermediates.is_empty());
    }

    #[test]
    fn is_expired_uses_not_after() {
        let (cert_pem, key_pem) = testutil::issue(&["example.com"], (2020, 1, 1), (2021, 1, 1));
        let material = CertificateMaterial::parse(&cert_pem, &key_pem).unwrap();
        assert!(material.is_expired(Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap()));
        assert!(!material.is_expired(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()));
    }

    proptest! {
        #[test]
        fn wildcard_never_matches_apex_or_deeper(label in "[a-z]{1,8}", deeper in "[a-z]{1,8}") {
            let single = format!("{}.example.com", label);
            let nested = format!("{}.{}.example.com", deeper, label);
            prop_assert!(hostname_matches("*.example.com", &single));
            prop_assert!(!hostname_matches("*.example.com", "example.com"));
            prop_assert!(!hostname_matches("*.example.com", &nested));
        }
    }
}
