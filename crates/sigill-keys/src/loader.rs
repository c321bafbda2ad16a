#![forbid(unsafe_code)]

//! Key loading from PEM, DER, PKCS#8, SubjectPublicKeyInfo and raw bytes.

use crate::cert::Certificate;
use crate::key::{Key, KeyData, KeyUsage};
use sigill_core::Error;

/// Load a public key from DER-encoded SubjectPublicKeyInfo.
///
/// Tries RSA, then EC P-256 and P-384.
pub fn load_spki_der(spki_der: &[u8]) -> Result<Key, Error> {
    use spki::DecodePublicKey;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::Rsa {
                private: None,
                public: pk,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP256 {
                private: None,
                public: vk,
            },
            KeyUsage::Verify,
        ));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der) {
        return Ok(Key::new(
            KeyData::EcP384 {
                private: None,
                public: vk,
            },
            KeyUsage::Verify,
        ));
    }
    Err(Error::Key("unsupported SubjectPublicKeyInfo".into()))
}

/// Load a private key from PKCS#8 DER.
pub fn load_pkcs8_der(der: &[u8]) -> Result<Key, Error> {
    use rsa::pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        let public = pk.to_public_key();
        return Ok(Key::new(
            KeyData::Rsa {
                private: Some(pk),
                public,
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        let vk = *sk.verifying_key();
        return Ok(Key::new(
            KeyData::EcP256 {
                private: Some(sk),
                public: vk,
            },
            KeyUsage::Any,
        ));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        let vk = *sk.verifying_key();
        return Ok(Key::new(
            KeyData::EcP384 {
                private: Some(sk),
                public: vk,
            },
            KeyUsage::Any,
        ));
    }
    Err(Error::Key("unsupported PKCS#8 private key".into()))
}

/// Load a key from one PEM block, dispatching on its label.
pub fn load_pem(pem_data: &[u8]) -> Result<Key, Error> {
    let (label, der_bytes) = pem_rfc7468::decode_vec(pem_data)
        .map_err(|e| Error::Key(format!("failed to decode PEM: {e}")))?;
    match label {
        "PRIVATE KEY" => load_pkcs8_der(&der_bytes),
        "PUBLIC KEY" => load_spki_der(&der_bytes),
        "CERTIFICATE" => Certificate::from_der(&der_bytes)?.public_key(),
        _ => Err(Error::Key(format!("unsupported PEM label: {label}"))),
    }
}

/// Load an HMAC key from raw binary data.
pub fn load_hmac_key(data: &[u8]) -> Key {
    Key::new(KeyData::Hmac(data.to_vec()), KeyUsage::Any)
}

/// Load a key from a file, auto-detecting the format.
///
/// `.hmac` and `.key` files that are neither PEM nor a DER structure are
/// taken as raw HMAC secrets.
pub fn load_key_file(path: &std::path::Path) -> Result<Key, Error> {
    let data = std::fs::read(path)?;
    if data.starts_with(b"-----BEGIN") {
        return load_pem(&data);
    }
    if let Ok(key) = load_pkcs8_der(&data) {
        return Ok(key);
    }
    if let Ok(key) = load_spki_der(&data) {
        return Ok(key);
    }
    if let Ok(cert) = Certificate::from_der(&data) {
        return cert.public_key();
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("hmac") || ext.eq_ignore_ascii_case("key") {
        return Ok(load_hmac_key(&data));
    }
    Err(Error::Key(format!(
        "unable to auto-detect key format from file: {}",
        path.display()
    )))
}
