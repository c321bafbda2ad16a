#![forbid(unsafe_code)]

//! Parsed X.509 certificates.
//!
//! A [`Certificate`] is parsed once and never mutated. Equality is on the
//! DER encoding.

use crate::diag::SkipReason;
use crate::key::{Key, KeyUsage};
use der::{Decode, Encode};
use sigill_core::{algorithm, Error};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use x509_cert::name::Name;

/// subjectKeyIdentifier extension
const SKI_OID: der::oid::ObjectIdentifier = der::oid::ObjectIdentifier::new_unwrap("2.5.29.14");

#[derive(Clone)]
pub struct Certificate {
    cert: x509_cert::Certificate,
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(data: &[u8]) -> Result<Self, Error> {
        let cert = x509_cert::Certificate::from_der(data)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self {
            cert,
            der: data.to_vec(),
        })
    }

    /// Parse a single PEM `CERTIFICATE` block.
    pub fn from_pem(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Certificate(format!("invalid PEM encoding: {e}")))?;
        let (label, der_bytes) = pem_rfc7468::decode_vec(text.trim().as_bytes())
            .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
        if label != "CERTIFICATE" {
            return Err(Error::Certificate(format!(
                "expected CERTIFICATE PEM label, got: {label}"
            )));
        }
        Self::from_der(&der_bytes)
    }

    /// PEM when the data starts with a PEM boundary, DER otherwise.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let start = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(data.len());
        if data[start..].starts_with(b"-----BEGIN") {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn inner(&self) -> &x509_cert::Certificate {
        &self.cert
    }

    pub fn subject_name(&self) -> &Name {
        &self.cert.tbs_certificate.subject
    }

    pub fn issuer_name(&self) -> &Name {
        &self.cert.tbs_certificate.issuer
    }

    /// Subject distinguished name in RFC 4514 form.
    pub fn subject(&self) -> String {
        self.subject_name().to_string()
    }

    /// Issuer distinguished name in RFC 4514 form.
    pub fn issuer(&self) -> String {
        self.issuer_name().to_string()
    }

    pub fn serial_bytes(&self) -> &[u8] {
        self.cert.tbs_certificate.serial_number.as_bytes()
    }

    /// Serial number as an unsigned decimal string, as used by
    /// `X509SerialNumber`.
    pub fn serial_decimal(&self) -> String {
        format_serial_decimal(self.serial_bytes())
    }

    pub fn not_before(&self) -> SystemTime {
        self.cert.tbs_certificate.validity.not_before.to_system_time()
    }

    pub fn not_after(&self) -> SystemTime {
        self.cert.tbs_certificate.validity.not_after.to_system_time()
    }

    /// Whether the certificate is inside its validity interval at `at`.
    pub fn check_validity(&self, at: SystemTime) -> Result<(), SkipReason> {
        if at < self.not_before() {
            return Err(SkipReason::NotYetValid);
        }
        if at > self.not_after() {
            return Err(SkipReason::Expired);
        }
        Ok(())
    }

    /// The subjectKeyIdentifier extension value, or the SHA-1 of the
    /// subject public key bits when the extension is absent.
    pub fn subject_key_identifier(&self) -> Vec<u8> {
        if let Some(exts) = &self.cert.tbs_certificate.extensions {
            for ext in exts.iter().filter(|e| e.extn_id == SKI_OID) {
                if let Ok(ski) =
                    x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes())
                {
                    return ski.0.as_bytes().to_vec();
                }
            }
        }
        use sha1::Digest;
        let bits = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes();
        sha1::Sha1::digest(bits).to_vec()
    }

    /// Digest of the DER encoding, for `X509Digest` matching.
    pub fn digest(&self, digest_uri: &str) -> Result<Vec<u8>, Error> {
        sigill_crypto::digest::digest(digest_uri, &self.der)
    }

    /// Public key of the certificate, tagged with the certificate itself.
    pub fn public_key(&self) -> Result<Key, Error> {
        let spki_der = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Key(format!("failed to encode SPKI: {e}")))?;
        let mut key = crate::loader::load_spki_der(&spki_der)?;
        key.usage = KeyUsage::Verify;
        Ok(key.with_certificate(self.clone()))
    }

    /// Whether `subject` names this certificate's subject.
    ///
    /// The XML text is parsed as an RFC 4514 name and compared by DER; a
    /// name that does not parse falls back to a whitespace-insensitive,
    /// case-insensitive comparison of the string forms.
    pub fn subject_matches(&self, subject: &str) -> bool {
        names_match(self.subject_name(), subject)
    }

    pub fn issuer_matches(&self, issuer: &str) -> bool {
        names_match(self.issuer_name(), issuer)
    }

    /// Whether this certificate is the one named by `issuer` and decimal
    /// `serial`.
    pub fn matches_issuer_serial(&self, issuer: &str, serial: &str) -> bool {
        let serial = serial.trim().trim_start_matches('0');
        let ours = self.serial_decimal();
        let ours = ours.trim_start_matches('0');
        serial == ours && self.issuer_matches(issuer)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("serial", &self.serial_decimal())
            .finish()
    }
}

fn names_match(name: &Name, text: &str) -> bool {
    if let Ok(parsed) = Name::from_str(text.trim()) {
        if let (Ok(a), Ok(b)) = (parsed.to_der(), name.to_der()) {
            if a == b {
                return true;
            }
        }
    }
    normalize_dn(&name.to_string()) == normalize_dn(text)
}

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| {
            rdn.split('=')
                .map(|part| part.trim().to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join("=")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Convert a big-endian ASN.1 INTEGER to an unsigned decimal string.
pub fn format_serial_decimal(bytes: &[u8]) -> String {
    // little-endian decimal digits
    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            let val = (*d as u32) * 256 + carry;
            *d = (val % 10) as u8;
            carry = val / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    digits.iter().rev().map(|d| (b'0' + d) as char).collect()
}

/// Digest URI used when an `X509Digest` omits its `Algorithm`.
pub const DEFAULT_CERT_DIGEST: &str = algorithm::SHA256;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    pub(crate) struct Minted {
        pub der: Vec<u8>,
        pub pem: String,
    }

    /// Self-signed certificate for `cn` valid between the given years.
    pub(crate) fn mint(cn: &str, serial: u64, from_year: i32, to_year: i32) -> Minted {
        mint_with(cn, serial, from_year, to_year, &rcgen::PKCS_ECDSA_P256_SHA256)
    }

    pub(crate) fn mint_with(
        cn: &str,
        serial: u64,
        from_year: i32,
        to_year: i32,
        alg: &'static rcgen::SignatureAlgorithm,
    ) -> Minted {
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, cn);
        params.serial_number = Some(rcgen::SerialNumber::from(serial));
        params.not_before = rcgen::date_time_ymd(from_year, 1, 1);
        params.not_after = rcgen::date_time_ymd(to_year, 1, 1);
        let key = rcgen::KeyPair::generate_for(alg).unwrap();
        let cert = params.self_signed(&key).unwrap();
        Minted {
            der: cert.der().to_vec(),
            pem: cert.pem(),
        }
    }

    #[test]
    fn test_format_serial_decimal() {
        assert_eq!(format_serial_decimal(&[]), "0");
        assert_eq!(format_serial_decimal(&[0x00]), "0");
        assert_eq!(format_serial_decimal(&[0x2a]), "42");
        assert_eq!(format_serial_decimal(&[0x00, 0xff]), "255");
        assert_eq!(format_serial_decimal(&[0x01, 0x00]), "256");
        assert_eq!(
            format_serial_decimal(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
            "18446744073709551616"
        );
    }

    #[test]
    fn test_parse_der_and_pem() {
        let minted = mint("alice", 42, 2020, 2090);
        let a = Certificate::from_der(&minted.der).unwrap();
        let b = Certificate::from_bytes(minted.pem.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.serial_decimal(), "42");
        assert_eq!(a.subject(), "CN=alice");
        assert!(a.subject_matches("CN=alice"));
        assert!(a.subject_matches(" cn = alice "));
        assert!(!a.subject_matches("CN=bob"));
        assert!(a.matches_issuer_serial("CN=alice", "42"));
        assert!(!a.matches_issuer_serial("CN=alice", "43"));
    }

    #[test]
    fn test_validity_window() {
        let cert = Certificate::from_der(&mint("c", 1, 2020, 2030).der).unwrap();
        let at = |year: u64| SystemTime::UNIX_EPOCH + Duration::from_secs((year - 1970) * 365 * 86_400);
        assert_eq!(cert.check_validity(at(2025)), Ok(()));
        assert_eq!(cert.check_validity(at(2019)), Err(SkipReason::NotYetValid));
        assert_eq!(cert.check_validity(at(2031)), Err(SkipReason::Expired));
    }

    #[test]
    fn test_subject_key_identifier_and_public_key() {
        let cert = Certificate::from_der(&mint("k", 7, 2020, 2090).der).unwrap();
        assert!(!cert.subject_key_identifier().is_empty());
        let key = cert.public_key().unwrap();
        assert_eq!(key.data.algorithm_name(), "EC P-256");
        assert_eq!(key.certificate.as_ref(), Some(&cert));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            Certificate::from_bytes(b"not a certificate"),
            Err(Error::Certificate(_))
        ));
        assert!(Certificate::from_bytes(b"-----BEGIN CERTIFICATE-----\n!!\n-----END CERTIFICATE-----\n").is_err());
    }
}
