#![forbid(unsafe_code)]

//! Resolvers that search a storage resolver by `<X509Data>` criteria.

use super::KeyResolver;
use crate::cert::Certificate;
use crate::key::Key;
use crate::keyinfo::{decode_base64, KeyInfo, X509Data};
use crate::storage::StorageResolver;
use sigill_core::{ns, KeyResolverError};

/// One way of recognising a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertCriterion {
    Ski(Vec<u8>),
    IssuerSerial { issuer: String, serial: String },
    SubjectName(String),
    Digest { algorithm: String, value: Vec<u8> },
    Certificate(Certificate),
}

impl CertCriterion {
    pub fn matches(&self, cert: &Certificate) -> bool {
        match self {
            Self::Ski(ski) => cert.subject_key_identifier() == *ski,
            Self::IssuerSerial { issuer, serial } => cert.matches_issuer_serial(issuer, serial),
            Self::SubjectName(name) => cert.subject_matches(name),
            Self::Digest { algorithm, value } => {
                cert.digest(algorithm).is_ok_and(|d| d == *value)
            }
            Self::Certificate(other) => other == cert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criteria {
    Ski,
    IssuerSerial,
    SubjectName,
    Any,
}

fn collect(data: &X509Data, which: Criteria) -> Result<Vec<CertCriterion>, KeyResolverError> {
    let mut out = Vec::new();
    if matches!(which, Criteria::Ski | Criteria::Any) {
        out.extend(data.decoded_skis()?.into_iter().map(CertCriterion::Ski));
    }
    if matches!(which, Criteria::IssuerSerial | Criteria::Any) {
        for is in &data.issuer_serials {
            if is.serial_number.is_empty() || !is.serial_number.chars().all(|c| c.is_ascii_digit()) {
                return Err(KeyResolverError::Malformed(format!(
                    "X509SerialNumber is not a decimal integer: {:?}",
                    is.serial_number
                )));
            }
            out.push(CertCriterion::IssuerSerial {
                issuer: is.issuer_name.clone(),
                serial: is.serial_number.clone(),
            });
        }
    }
    if matches!(which, Criteria::SubjectName | Criteria::Any) {
        out.extend(data.subject_names.iter().cloned().map(CertCriterion::SubjectName));
    }
    if which == Criteria::Any {
        for d in &data.digests {
            out.push(CertCriterion::Digest {
                algorithm: d.algorithm.clone(),
                value: decode_base64(&d.value, ns::node::X509_DIGEST)?,
            });
        }
        out.extend(data.decoded_certificates()?.into_iter().map(CertCriterion::Certificate));
    }
    Ok(out)
}

/// Shared search: `Ok(None)` when the KeyInfo carries no criterion of this
/// kind, `Declined` when it does but there is no storage to search. A match
/// whose key cannot be used is skipped; `Declined` is returned only when
/// every match was unusable.
fn scan(
    name: &'static str,
    which: Criteria,
    key_info: &KeyInfo,
    storage: Option<&StorageResolver>,
) -> Result<Option<Key>, KeyResolverError> {
    let mut criteria = Vec::new();
    for data in &key_info.x509_data {
        criteria.extend(collect(data, which)?);
    }
    if criteria.is_empty() {
        return Ok(None);
    }
    let Some(storage) = storage else {
        return Err(KeyResolverError::Declined(format!(
            "{name} needs a storage resolver"
        )));
    };
    let mut unusable = None;
    for cert in storage.iter().filter(|cert| criteria.iter().any(|c| c.matches(cert))) {
        match cert.public_key() {
            Ok(key) => {
                tracing::trace!(resolver = name, subject = %cert.subject(), "certificate matched");
                return Ok(Some(key));
            }
            Err(e) => {
                tracing::debug!(
                    resolver = name,
                    subject = %cert.subject(),
                    error = %e,
                    "matched certificate has no usable key"
                );
                unusable.get_or_insert(e);
            }
        }
    }
    match unusable {
        Some(e) => Err(KeyResolverError::Declined(e.to_string())),
        None => Ok(None),
    }
}

/// `<X509SKI>` against the storage resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509SkiResolver;

impl KeyResolver for X509SkiResolver {
    fn name(&self) -> &'static str {
        "x509-ski"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        scan(self.name(), Criteria::Ski, key_info, storage)
    }
}

/// `<X509IssuerSerial>` against the storage resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509IssuerSerialResolver;

impl KeyResolver for X509IssuerSerialResolver {
    fn name(&self) -> &'static str {
        "x509-issuer-serial"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        scan(self.name(), Criteria::IssuerSerial, key_info, storage)
    }
}

/// `<X509SubjectName>` against the storage resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509SubjectNameResolver;

impl KeyResolver for X509SubjectNameResolver {
    fn name(&self) -> &'static str {
        "x509-subject-name"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        scan(self.name(), Criteria::SubjectName, key_info, storage)
    }
}

/// Any `<X509Data>` criterion, including `<X509Digest>` and embedded
/// certificates, against the storage resolver. The first certificate in
/// storage order that matches any criterion wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageScanResolver;

impl KeyResolver for StorageScanResolver {
    fn name(&self) -> &'static str {
        "storage-scan"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        scan(self.name(), Criteria::Any, key_info, storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::tests::{mint, mint_with};
    use crate::source::MemorySource;
    use sigill_core::algorithm;

    fn cert(cn: &str, serial: u64) -> Certificate {
        Certificate::from_der(&mint(cn, serial, 2020, 2090).der).unwrap()
    }

    fn storage_of(certs: &[Certificate]) -> StorageResolver {
        StorageResolver::new().with(MemorySource::new(certs.to_vec()))
    }

    #[test]
    fn test_ski_match() {
        let (a, b) = (cert("a", 1), cert("b", 2));
        let storage = storage_of(&[a.clone(), b.clone()]);
        let info = KeyInfo::new()
            .with_x509_data(X509Data::default().with_ski(&b.subject_key_identifier()));
        let key = X509SkiResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate, Some(b));
    }

    #[test]
    fn test_subject_name_match() {
        let (a, b) = (cert("a", 1), cert("b", 2));
        let storage = storage_of(&[a.clone(), b]);
        let info = KeyInfo::new().with_x509_data(X509Data::default().with_subject_name("CN=a"));
        let key = X509SubjectNameResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate, Some(a));
    }

    #[test]
    fn test_issuer_serial_no_match_is_none() {
        let storage = storage_of(&[cert("a", 1)]);
        let info = KeyInfo::new()
            .with_x509_data(X509Data::default().with_issuer_serial("CN=a", "2"));
        assert!(X509IssuerSerialResolver.resolve(&info, Some(&storage)).unwrap().is_none());
    }

    #[test]
    fn test_bad_serial_is_malformed() {
        let info = KeyInfo::new()
            .with_x509_data(X509Data::default().with_issuer_serial("CN=a", "0x2a"));
        assert!(matches!(
            X509IssuerSerialResolver.resolve(&info, None),
            Err(KeyResolverError::Malformed(_))
        ));
    }

    #[test]
    fn test_without_storage_declines() {
        let info = KeyInfo::new().with_x509_data(X509Data::default().with_subject_name("CN=a"));
        assert!(matches!(
            X509SubjectNameResolver.resolve(&info, None),
            Err(KeyResolverError::Declined(_))
        ));
        // nothing to look for: no opinion at all
        assert!(X509SkiResolver.resolve(&info, None).unwrap().is_none());
    }

    #[test]
    fn test_storage_scan_by_digest() {
        let (a, b) = (cert("a", 1), cert("b", 2));
        let digest = b.digest(algorithm::SHA256).unwrap();
        let storage = storage_of(&[a, b.clone()]);
        let info = KeyInfo::new()
            .with_x509_data(X509Data::default().with_digest(algorithm::SHA256, &digest));
        let key = StorageScanResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate, Some(b));
    }

    #[test]
    fn test_unusable_match_is_skipped() {
        let ed25519 = Certificate::from_der(
            &mint_with("shared", 1, 2020, 2090, &rcgen::PKCS_ED25519).der,
        )
        .unwrap();
        let usable = cert("shared", 2);
        let info = KeyInfo::new().with_x509_data(X509Data::default().with_subject_name("CN=shared"));

        let storage = storage_of(&[ed25519.clone(), usable.clone()]);
        let key = X509SubjectNameResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate, Some(usable));
        let key = StorageScanResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate.map(|c| c.serial_decimal()), Some("2".into()));

        // only unusable matches left
        let storage = storage_of(&[ed25519]);
        assert!(matches!(
            X509SubjectNameResolver.resolve(&info, Some(&storage)),
            Err(KeyResolverError::Declined(_))
        ));
    }

    #[test]
    fn test_storage_scan_first_in_storage_order() {
        let (a, b) = (cert("a", 1), cert("b", 2));
        let storage = storage_of(&[b.clone(), a]);
        let info = KeyInfo::new().with_x509_data(
            X509Data::default()
                .with_subject_name("CN=a")
                .with_subject_name("CN=b"),
        );
        let key = StorageScanResolver.resolve(&info, Some(&storage)).unwrap().unwrap();
        assert_eq!(key.certificate, Some(b));
    }
}
