#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA, ECDSA, HMAC).

use crate::policy::{validate_output_length, MacFamily, MacPolicy};
use signature::SignatureEncoding;
use sigill_core::{algorithm, Error};
use subtle::ConstantTimeEq;

/// Key material for signature operations.
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
    Hmac(Vec<u8>),
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI with the full output length.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    from_uri_with_output_length(uri, None, MacPolicy::default())
}

/// Create a signature algorithm, applying an explicit MAC output length.
///
/// `output_bits` is only meaningful for HMAC URIs; a length below the
/// family minimum fails here unless `policy` opts out.
pub fn from_uri_with_output_length(
    uri: &str,
    output_bits: Option<usize>,
    policy: MacPolicy,
) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    if let Some(family) = MacFamily::from_uri(uri) {
        return Ok(Box::new(HmacSign::new(family, output_bits, policy)?));
    }
    if output_bits.is_some() {
        return Err(Error::UnsupportedAlgorithm(format!(
            "output length is only defined for HMAC, not {uri}"
        )));
    }
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA224 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA224, hash: HashType::Sha224 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA1 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA1, hash: HashType::Sha1 })),
        algorithm::ECDSA_SHA256 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA256, hash: HashType::Sha256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA384, hash: HashType::Sha384 })),
        algorithm::ECDSA_SHA512 => Ok(Box::new(Ecdsa { uri: algorithm::ECDSA_SHA512, hash: HashType::Sha512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha224, Sha256, Sha384, Sha512 }

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl RsaPkcs1v15 {
    fn sign_with_key(&self, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk
                    .try_sign(data)
                    .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?;
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha224 => do_sign!(sha2::Sha224),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify_with_key(&self, public_key: &rsa::RsaPublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha224 => do_verify!(sha2::Sha224),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match key {
            SigningKey::Rsa(pk) => self.sign_with_key(pk, data),
            _ => Err(Error::Key("RSA private key required".into())),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let pubk = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required".into())),
        };
        self.verify_with_key(&pubk, data, sig_bytes)
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────

/// ECDSA over P-256 or P-384, chosen by the key. The URI names the hash;
/// the digest is signed as a prehash so `ecdsa-sha1` really hashes with
/// SHA-1.
struct Ecdsa { uri: &'static str, hash: HashType }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!("P-256 signature must be 64 bytes, got {}", rs.len())));
    }
    p256::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!("P-384 signature must be 96 bytes, got {}", rs.len())));
    }
    p384::ecdsa::Signature::from_slice(rs)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

fn prehash(hash: HashType, data: &[u8]) -> Vec<u8> {
    use sha2::Digest;
    match hash {
        HashType::Sha1 => sha1::Sha1::digest(data).to_vec(),
        HashType::Sha224 => sha2::Sha224::digest(data).to_vec(),
        HashType::Sha256 => sha2::Sha256::digest(data).to_vec(),
        HashType::Sha384 => sha2::Sha384::digest(data).to_vec(),
        HashType::Sha512 => sha2::Sha512::digest(data).to_vec(),
    }
}

impl SignatureAlgorithm for Ecdsa {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::hazmat::PrehashSigner;
        let digest = prehash(self.hash, data);
        let failed = |e: signature::Error| Error::Crypto(format!("ECDSA signing failed: {e}"));
        match key {
            SigningKey::EcP256(sk) => {
                let sig: p256::ecdsa::Signature = sk.sign_prehash(&digest).map_err(failed)?;
                Ok(sig.to_bytes().to_vec())
            }
            SigningKey::EcP384(sk) => {
                let sig: p384::ecdsa::Signature = sk.sign_prehash(&digest).map_err(failed)?;
                Ok(sig.to_bytes().to_vec())
            }
            _ => Err(Error::Key("EC private key required".into())),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::hazmat::PrehashVerifier;
        let digest = prehash(self.hash, data);
        match key {
            SigningKey::EcP256(sk) => {
                Ok(sk.verifying_key().verify_prehash(&digest, &xmldsig_to_p256(sig_bytes)?).is_ok())
            }
            SigningKey::EcP256Public(vk) => {
                Ok(vk.verify_prehash(&digest, &xmldsig_to_p256(sig_bytes)?).is_ok())
            }
            SigningKey::EcP384(sk) => {
                Ok(sk.verifying_key().verify_prehash(&digest, &xmldsig_to_p384(sig_bytes)?).is_ok())
            }
            SigningKey::EcP384Public(vk) => {
                Ok(vk.verify_prehash(&digest, &xmldsig_to_p384(sig_bytes)?).is_ok())
            }
            _ => Err(Error::Key("EC key required".into())),
        }
    }
}

// ── HMAC ─────────────────────────────────────────────────────────────

/// HMAC signer with an optional truncated output length.
#[derive(Debug, Clone)]
pub struct HmacSign {
    family: MacFamily,
    output_bits: Option<usize>,
    policy: MacPolicy,
}

impl HmacSign {
    /// Validates `output_bits` against `policy` before anything is signed.
    pub fn new(
        family: MacFamily,
        output_bits: Option<usize>,
        policy: MacPolicy,
    ) -> Result<Self, Error> {
        let hmac = Self {
            family,
            output_bits,
            policy,
        };
        hmac.check_policy()?;
        Ok(hmac)
    }

    pub fn family(&self) -> MacFamily {
        self.family
    }

    /// Effective output length in bits.
    pub fn output_bits(&self) -> usize {
        self.output_bits.unwrap_or(self.family.digest_bits())
    }

    fn check_policy(&self) -> Result<(), Error> {
        if let Some(bits) = self.output_bits {
            validate_output_length(self.family, bits, self.policy)?;
        }
        Ok(())
    }

    fn mac(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_policy()?;
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let mut full = compute_hmac(self.family, key_bytes, data)?;
        full.truncate(self.output_bits() / 8);
        Ok(full)
    }
}

impl SignatureAlgorithm for HmacSign {
    fn uri(&self) -> &'static str { self.family.uri() }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.mac(key, data)
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let expected = self.mac(key, data)?;
        // Lengths must match exactly; a shorter value is never a prefix match.
        if sig_bytes.len() != expected.len() {
            return Ok(false);
        }
        Ok(expected.ct_eq(sig_bytes).into())
    }
}

fn compute_hmac(family: MacFamily, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    use hmac::{Hmac, Mac};
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("invalid HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match family {
        MacFamily::HmacSha1 => hmac_compute!(sha1::Sha1),
        MacFamily::HmacSha224 => hmac_compute!(sha2::Sha224),
        MacFamily::HmacSha256 => hmac_compute!(sha2::Sha256),
        MacFamily::HmacSha384 => hmac_compute!(sha2::Sha384),
        MacFamily::HmacSha512 => hmac_compute!(sha2::Sha512),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigill_core::SignatureError;

    fn hmac_key() -> SigningKey {
        SigningKey::Hmac(b"secret".to_vec())
    }

    #[test]
    fn test_hmac_sha1_forty_bits_rejected_at_construction() {
        let err = from_uri_with_output_length(algorithm::HMAC_SHA1, Some(40), MacPolicy::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Signature(SignatureError::OutputLengthBelowMinimum {
                requested: 40,
                minimum: 80,
                ..
            })
        ));
    }

    #[test]
    fn test_hmac_truncated_round_trip() {
        let alg = from_uri_with_output_length(algorithm::HMAC_SHA256, Some(128), MacPolicy::default())
            .unwrap();
        let sig = alg.sign(&hmac_key(), b"data").unwrap();
        assert_eq!(sig.len(), 16);
        assert!(alg.verify(&hmac_key(), b"data", &sig).unwrap());
        assert!(!alg.verify(&hmac_key(), b"other", &sig).unwrap());
    }

    #[test]
    fn test_hmac_prefix_does_not_verify() {
        let alg = from_uri(algorithm::HMAC_SHA1).unwrap();
        let sig = alg.sign(&hmac_key(), b"data").unwrap();
        assert_eq!(sig.len(), 20);
        assert!(!alg.verify(&hmac_key(), b"data", &sig[..1]).unwrap());
        assert!(!alg.verify(&hmac_key(), b"data", &sig[..10]).unwrap());
        assert!(!alg.verify(&hmac_key(), b"data", &[]).unwrap());
    }

    #[test]
    fn test_policy_rechecked_at_use() {
        // Bypasses the constructor to model a signer whose configuration was
        // never validated.
        let weak = HmacSign {
            family: MacFamily::HmacSha1,
            output_bits: Some(8),
            policy: MacPolicy::default(),
        };
        assert!(matches!(
            weak.sign(&hmac_key(), b"data"),
            Err(Error::Signature(SignatureError::OutputLengthBelowMinimum { .. }))
        ));
        assert!(weak.verify(&hmac_key(), b"data", &[0]).is_err());
    }

    #[test]
    fn test_permissive_policy_allows_short_mac() {
        let alg = from_uri_with_output_length(algorithm::HMAC_SHA1, Some(8), MacPolicy::permissive())
            .unwrap();
        let sig = alg.sign(&hmac_key(), b"data").unwrap();
        assert_eq!(sig.len(), 1);
        assert!(alg.verify(&hmac_key(), b"data", &sig).unwrap());
    }

    #[test]
    fn test_output_length_rejected_for_non_mac() {
        assert!(from_uri_with_output_length(algorithm::RSA_SHA256, Some(128), MacPolicy::default()).is_err());
    }

    #[test]
    fn test_ecdsa_p256_round_trip() {
        let sk = p256::ecdsa::SigningKey::from_slice(&[7u8; 32]).unwrap();
        let vk = *sk.verifying_key();
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let sig = alg.sign(&SigningKey::EcP256(sk), b"payload").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(alg.verify(&SigningKey::EcP256Public(vk), b"payload", &sig).unwrap());
        assert!(!alg.verify(&SigningKey::EcP256Public(vk), b"tampered", &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_uri_names_the_hash() {
        use sha2::Digest;
        use signature::hazmat::PrehashVerifier;

        let sk = p256::ecdsa::SigningKey::from_slice(&[7u8; 32]).unwrap();
        let vk = *sk.verifying_key();
        let sig = from_uri(algorithm::ECDSA_SHA1)
            .unwrap()
            .sign(&SigningKey::EcP256(sk), b"payload")
            .unwrap();
        let sig = xmldsig_to_p256(&sig).unwrap();

        let sha1 = sha1::Sha1::digest(b"payload");
        let sha256 = sha2::Sha256::digest(b"payload");
        assert!(vk.verify_prehash(&sha1, &sig).is_ok());
        assert!(vk.verify_prehash(&sha256, &sig).is_err());
    }

    #[test]
    fn test_ecdsa_sha512_on_p384() {
        let sk = p384::ecdsa::SigningKey::from_slice(&[9u8; 48]).unwrap();
        let vk = *sk.verifying_key();
        let alg = from_uri(algorithm::ECDSA_SHA512).unwrap();
        let sig = alg.sign(&SigningKey::EcP384(sk), b"payload").unwrap();
        assert_eq!(sig.len(), 96);
        assert!(alg.verify(&SigningKey::EcP384Public(vk), b"payload", &sig).unwrap());
        // same key, different hash
        assert!(!from_uri(algorithm::ECDSA_SHA384)
            .unwrap()
            .verify(&SigningKey::EcP384Public(vk), b"payload", &sig)
            .unwrap());
    }

    #[test]
    fn test_wrong_key_type() {
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        assert!(matches!(alg.sign(&hmac_key(), b"x"), Err(Error::Key(_))));
    }
}
