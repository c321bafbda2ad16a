#![forbid(unsafe_code)]

//! `<ds:KeyInfo>` metadata.
//!
//! [`KeyInfo`] keeps the values exactly as they were written (base64 text,
//! decimal serials, distinguished names). Resolvers decode what they need and
//! report undecodable input as [`KeyResolverError::Malformed`].

use crate::cert::Certificate;
use crate::key::{Key, KeyData, KeyUsage};
use base64::Engine;
use sigill_core::{algorithm, ns, KeyResolverError};
use sigill_xml::{EventArena, NodeId};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Everything a `<KeyInfo>` says about the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    pub key_names: Vec<String>,
    pub key_values: Vec<KeyValue>,
    pub x509_data: Vec<X509Data>,
}

/// One `<KeyValue>` child, or a `<dsig11:DEREncodedKeyValue>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Rsa { modulus: String, exponent: String },
    Ec { named_curve: String, public_key: String },
    DerEncoded(String),
    /// A key value type this library does not understand, by local name.
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSerial {
    pub issuer_name: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Digest {
    pub algorithm: String,
    pub value: String,
}

/// One `<X509Data>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct X509Data {
    pub certificates: Vec<String>,
    pub subject_names: Vec<String>,
    pub issuer_serials: Vec<IssuerSerial>,
    pub skis: Vec<String>,
    pub digests: Vec<X509Digest>,
}

impl KeyInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.key_names.is_empty() && self.key_values.is_empty() && self.x509_data.is_empty()
    }

    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_names.push(name.into());
        self
    }

    pub fn with_key_value(mut self, value: KeyValue) -> Self {
        self.key_values.push(value);
        self
    }

    pub fn with_x509_data(mut self, data: X509Data) -> Self {
        self.x509_data.push(data);
        self
    }

    /// Read the `<KeyInfo>` element `key_info` out of an event arena.
    pub fn from_events(arena: &EventArena, key_info: NodeId) -> Result<Self, KeyResolverError> {
        let name = arena
            .element_name(key_info)
            .ok_or_else(|| KeyResolverError::Malformed("KeyInfo is not an element".into()))?;
        if !name.is(ns::DSIG, ns::node::KEY_INFO) {
            return Err(KeyResolverError::Malformed(format!(
                "expected KeyInfo, found {name}"
            )));
        }

        let mut info = KeyInfo::new();
        for child in arena.child_elements(key_info) {
            let Some(name) = arena.element_name(child) else {
                continue;
            };
            let namespace = name.namespace.as_deref().unwrap_or("");
            match (namespace, name.local_name.as_str()) {
                (ns::DSIG, ns::node::KEY_NAME) => {
                    let text = arena.text(child).trim().to_owned();
                    if !text.is_empty() {
                        info.key_names.push(text);
                    }
                }
                (ns::DSIG, ns::node::KEY_VALUE) => {
                    for value in arena.child_elements(child) {
                        info.key_values.push(read_key_value(arena, value)?);
                    }
                }
                (ns::DSIG11, ns::node::DER_ENCODED_KEY_VALUE) => {
                    info.key_values.push(KeyValue::DerEncoded(arena.text(child)));
                }
                (ns::DSIG, ns::node::X509_DATA) => {
                    info.x509_data.push(read_x509_data(arena, child)?);
                }
                _ => {}
            }
        }
        Ok(info)
    }
}

fn required_child(
    arena: &EventArena,
    parent: NodeId,
    namespace: &str,
    local_name: &str,
) -> Result<NodeId, KeyResolverError> {
    arena
        .find_child(parent, namespace, local_name)
        .ok_or_else(|| KeyResolverError::Malformed(format!("missing {local_name}")))
}

fn read_key_value(arena: &EventArena, node: NodeId) -> Result<KeyValue, KeyResolverError> {
    let Some(name) = arena.element_name(node) else {
        return Err(KeyResolverError::Malformed("KeyValue child is not an element".into()));
    };
    let namespace = name.namespace.as_deref().unwrap_or("");
    match (namespace, name.local_name.as_str()) {
        (ns::DSIG, ns::node::RSA_KEY_VALUE) => Ok(KeyValue::Rsa {
            modulus: arena.text(required_child(arena, node, ns::DSIG, ns::node::RSA_MODULUS)?),
            exponent: arena.text(required_child(arena, node, ns::DSIG, ns::node::RSA_EXPONENT)?),
        }),
        (ns::DSIG11 | ns::DSIG, ns::node::EC_KEY_VALUE) => {
            let curve = arena
                .find_child(node, ns::DSIG11, ns::node::NAMED_CURVE)
                .or_else(|| arena.find_child(node, ns::DSIG, ns::node::NAMED_CURVE))
                .ok_or_else(|| KeyResolverError::Malformed("missing NamedCurve".into()))?;
            let named_curve = arena
                .attribute(curve, ns::attr::URI)
                .ok_or_else(|| KeyResolverError::Malformed("NamedCurve without URI".into()))?
                .to_owned();
            let public_key = arena
                .find_child(node, ns::DSIG11, ns::node::PUBLIC_KEY)
                .or_else(|| arena.find_child(node, ns::DSIG, ns::node::PUBLIC_KEY))
                .map(|n| arena.text(n))
                .ok_or_else(|| KeyResolverError::Malformed("missing PublicKey".into()))?;
            Ok(KeyValue::Ec {
                named_curve,
                public_key,
            })
        }
        (_, other) => Ok(KeyValue::Unsupported(other.to_owned())),
    }
}

fn read_x509_data(arena: &EventArena, node: NodeId) -> Result<X509Data, KeyResolverError> {
    let mut data = X509Data::default();
    for child in arena.child_elements(node) {
        let Some(name) = arena.element_name(child) else {
            continue;
        };
        if name.namespace.as_deref() != Some(ns::DSIG) && name.namespace.as_deref() != Some(ns::DSIG11) {
            continue;
        }
        match name.local_name.as_str() {
            ns::node::X509_CERTIFICATE => data.certificates.push(arena.text(child)),
            ns::node::X509_SUBJECT_NAME => data.subject_names.push(arena.text(child).trim().to_owned()),
            ns::node::X509_SKI => data.skis.push(arena.text(child)),
            ns::node::X509_ISSUER_SERIAL => {
                let issuer = required_child(arena, child, ns::DSIG, ns::node::X509_ISSUER_NAME)?;
                let serial = required_child(arena, child, ns::DSIG, ns::node::X509_SERIAL_NUMBER)?;
                data.issuer_serials.push(IssuerSerial {
                    issuer_name: arena.text(issuer).trim().to_owned(),
                    serial_number: arena.text(serial).trim().to_owned(),
                });
            }
            ns::node::X509_DIGEST => data.digests.push(X509Digest {
                algorithm: arena
                    .attribute(child, ns::attr::ALGORITHM)
                    .unwrap_or(crate::cert::DEFAULT_CERT_DIGEST)
                    .to_owned(),
                value: arena.text(child),
            }),
            _ => {}
        }
    }
    Ok(data)
}

impl X509Data {
    pub fn with_certificate(mut self, cert: &Certificate) -> Self {
        self.certificates.push(B64.encode(cert.der()));
        self
    }

    pub fn with_subject_name(mut self, name: impl Into<String>) -> Self {
        self.subject_names.push(name.into());
        self
    }

    pub fn with_issuer_serial(mut self, issuer: impl Into<String>, serial: impl Into<String>) -> Self {
        self.issuer_serials.push(IssuerSerial {
            issuer_name: issuer.into(),
            serial_number: serial.into(),
        });
        self
    }

    pub fn with_ski(mut self, ski: &[u8]) -> Self {
        self.skis.push(B64.encode(ski));
        self
    }

    pub fn with_digest(mut self, algorithm: &str, value: &[u8]) -> Self {
        self.digests.push(X509Digest {
            algorithm: algorithm.to_owned(),
            value: B64.encode(value),
        });
        self
    }

    /// Decode every embedded `<X509Certificate>`.
    pub fn decoded_certificates(&self) -> Result<Vec<Certificate>, KeyResolverError> {
        self.certificates
            .iter()
            .map(|b64| {
                let der = decode_base64(b64, ns::node::X509_CERTIFICATE)?;
                Certificate::from_der(&der)
                    .map_err(|e| KeyResolverError::Malformed(e.to_string()))
            })
            .collect()
    }

    pub fn decoded_skis(&self) -> Result<Vec<Vec<u8>>, KeyResolverError> {
        self.skis
            .iter()
            .map(|s| decode_base64(s, ns::node::X509_SKI))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
            && self.subject_names.is_empty()
            && self.issuer_serials.is_empty()
            && self.skis.is_empty()
            && self.digests.is_empty()
    }
}

impl KeyValue {
    /// Decode into a public key. `Ok(None)` for unsupported key value types.
    pub fn to_key(&self) -> Result<Option<Key>, KeyResolverError> {
        match self {
            Self::Rsa { modulus, exponent } => {
                let n = decode_crypto_binary(modulus, ns::node::RSA_MODULUS)?;
                let e = decode_crypto_binary(exponent, ns::node::RSA_EXPONENT)?;
                let public = rsa::RsaPublicKey::new(
                    rsa::BigUint::from_bytes_be(&n),
                    rsa::BigUint::from_bytes_be(&e),
                )
                .map_err(|err| KeyResolverError::Malformed(format!("invalid RSA public key: {err}")))?;
                Ok(Some(Key::new(
                    KeyData::Rsa { private: None, public },
                    KeyUsage::Verify,
                )))
            }
            Self::Ec {
                named_curve,
                public_key,
            } => {
                let point = decode_base64(public_key, ns::node::PUBLIC_KEY)?;
                ec_key(named_curve, &point).map(Some)
            }
            Self::DerEncoded(b64) => {
                let der = decode_base64(b64, ns::node::DER_ENCODED_KEY_VALUE)?;
                crate::loader::load_spki_der(&der)
                    .map(Some)
                    .map_err(|e| KeyResolverError::Malformed(e.to_string()))
            }
            Self::Unsupported(_) => Ok(None),
        }
    }
}

fn ec_key(curve_uri: &str, point: &[u8]) -> Result<Key, KeyResolverError> {
    let malformed = |e: String| KeyResolverError::Malformed(e);
    match curve_uri {
        algorithm::CURVE_P256 => {
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(point)
                .map_err(|e| malformed(format!("invalid P-256 point: {e}")))?;
            Ok(Key::new(
                KeyData::EcP256 { private: None, public: vk },
                KeyUsage::Verify,
            ))
        }
        algorithm::CURVE_P384 => {
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(point)
                .map_err(|e| malformed(format!("invalid P-384 point: {e}")))?;
            Ok(Key::new(
                KeyData::EcP384 { private: None, public: vk },
                KeyUsage::Verify,
            ))
        }
        other => Err(malformed(format!("unsupported EC curve: {other}"))),
    }
}

/// Strip whitespace and decode base64.
pub fn decode_base64(text: &str, what: &str) -> Result<Vec<u8>, KeyResolverError> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Err(KeyResolverError::Malformed(format!("{what}: empty value")));
    }
    B64.decode(&clean)
        .map_err(|e| KeyResolverError::Malformed(format!("{what}: {e}")))
}

/// Decode a CryptoBinary value that may be base64 or hex encoded.
///
/// Some interop vectors write RSA modulus and exponent as hex.
fn decode_crypto_binary(text: &str, what: &str) -> Result<Vec<u8>, KeyResolverError> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if let Ok(bytes) = B64.decode(&clean) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }
    if clean.len() >= 2 && clean.len() % 2 == 0 && clean.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes: Result<Vec<u8>, _> = (0..clean.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&clean[i..i + 2], 16))
            .collect();
        if let Ok(bytes) = bytes {
            return Ok(bytes);
        }
    }
    Err(KeyResolverError::Malformed(format!("{what}: not base64 or hex")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_xml::parse_events;

    fn key_info_of(xml: &str) -> Result<KeyInfo, KeyResolverError> {
        let arena = parse_events(xml).unwrap();
        let node = arena.find_element(ns::DSIG, ns::node::KEY_INFO).unwrap();
        KeyInfo::from_events(&arena, node)
    }

    #[test]
    fn test_from_events_reads_all_kinds() {
        let info = key_info_of(
            r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <ds:KeyName> alice </ds:KeyName>
  <ds:X509Data>
    <ds:X509SubjectName>CN=alice</ds:X509SubjectName>
    <ds:X509IssuerSerial>
      <ds:X509IssuerName>CN=ca</ds:X509IssuerName>
      <ds:X509SerialNumber>42</ds:X509SerialNumber>
    </ds:X509IssuerSerial>
    <ds:X509SKI>AQID</ds:X509SKI>
  </ds:X509Data>
  <ds:KeyValue><ds:RSAKeyValue><ds:Modulus>AQAB</ds:Modulus><ds:Exponent>AQAB</ds:Exponent></ds:RSAKeyValue></ds:KeyValue>
</ds:KeyInfo>"#,
        )
        .unwrap();
        assert_eq!(info.key_names, vec!["alice"]);
        let x509 = &info.x509_data[0];
        assert_eq!(x509.subject_names, vec!["CN=alice"]);
        assert_eq!(x509.issuer_serials[0].serial_number, "42");
        assert_eq!(x509.decoded_skis().unwrap(), vec![vec![1, 2, 3]]);
        assert!(matches!(info.key_values[0], KeyValue::Rsa { .. }));
    }

    #[test]
    fn test_incomplete_issuer_serial_is_malformed() {
        let err = key_info_of(
            r#"<KeyInfo xmlns="http://www.w3.org/2000/09/xmldsig#"><X509Data><X509IssuerSerial>
<X509IssuerName>CN=ca</X509IssuerName></X509IssuerSerial></X509Data></KeyInfo>"#,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_der_encoded_key_value_namespace() {
        let xml = |prefix: &str| {
            format!(
                r#"<ds:KeyInfo xmlns:ds="{}" xmlns:dsig11="{}"><{prefix}:DEREncodedKeyValue>AQID</{prefix}:DEREncodedKeyValue></ds:KeyInfo>"#,
                ns::DSIG,
                ns::DSIG11,
            )
        };
        let info = key_info_of(&xml("dsig11")).unwrap();
        assert!(matches!(&info.key_values[..], [KeyValue::DerEncoded(v)] if v == "AQID"));
        assert!(key_info_of(&xml("ds")).unwrap().key_values.is_empty());
    }

    #[test]
    fn test_ec_key_value() {
        let sk = p256::ecdsa::SigningKey::from_slice(&[3u8; 32]).unwrap();
        let point = sk.verifying_key().to_encoded_point(false);
        let value = KeyValue::Ec {
            named_curve: algorithm::CURVE_P256.into(),
            public_key: B64.encode(point.as_bytes()),
        };
        let key = value.to_key().unwrap().unwrap();
        assert!(matches!(key.data, KeyData::EcP256 { .. }));

        let bad = KeyValue::Ec {
            named_curve: algorithm::CURVE_P256.into(),
            public_key: "AAAA".into(),
        };
        assert!(matches!(bad.to_key(), Err(KeyResolverError::Malformed(_))));
    }

    #[test]
    fn test_crypto_binary_hex_fallback() {
        assert_eq!(decode_crypto_binary("010001", "Exponent").unwrap(), vec![1, 0, 1]);
        assert!(decode_crypto_binary("!!", "Exponent").is_err());
    }

    #[test]
    fn test_builder() {
        let info = KeyInfo::new()
            .with_key_name("k")
            .with_x509_data(X509Data::default().with_ski(&[9, 9]));
        assert!(!info.is_empty());
        assert_eq!(info.x509_data[0].skis, vec!["CQk="]);
        assert!(KeyInfo::new().is_empty());
    }
}
