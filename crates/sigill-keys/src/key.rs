#![forbid(unsafe_code)]

//! Key types and data structures.

use crate::cert::Certificate;
use sigill_crypto::sign::SigningKey;

/// Usage flags for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
    Verify,
    Any,
}

/// The underlying key data.
#[derive(Clone)]
pub enum KeyData {
    Rsa {
        private: Option<rsa::RsaPrivateKey>,
        public: rsa::RsaPublicKey,
    },
    EcP256 {
        private: Option<p256::ecdsa::SigningKey>,
        public: p256::ecdsa::VerifyingKey,
    },
    EcP384 {
        private: Option<p384::ecdsa::SigningKey>,
        public: p384::ecdsa::VerifyingKey,
    },
    Hmac(Vec<u8>),
}

impl KeyData {
    /// Short algorithm label for reports.
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::EcP256 { .. } => "EC P-256",
            Self::EcP384 { .. } => "EC P-384",
            Self::Hmac(_) => "HMAC",
        }
    }

    pub fn has_private(&self) -> bool {
        match self {
            Self::Rsa { private, .. } => private.is_some(),
            Self::EcP256 { private, .. } => private.is_some(),
            Self::EcP384 { private, .. } => private.is_some(),
            Self::Hmac(_) => true,
        }
    }

    /// Whether both keys carry the same public (or symmetric) material.
    pub fn same_public(&self, other: &KeyData) -> bool {
        match (self, other) {
            (Self::Rsa { public: a, .. }, Self::Rsa { public: b, .. }) => a == b,
            (Self::EcP256 { public: a, .. }, Self::EcP256 { public: b, .. }) => a == b,
            (Self::EcP384 { public: a, .. }, Self::EcP384 { public: b, .. }) => a == b,
            (Self::Hmac(a), Self::Hmac(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac(k) => write!(f, "HMAC key ({} bytes)", k.len()),
            other if other.has_private() => {
                write!(f, "{} private+public key", other.algorithm_name())
            }
            other => write!(f, "{} public key", other.algorithm_name()),
        }
    }
}

/// A named key with associated data.
#[derive(Debug, Clone)]
pub struct Key {
    /// Optional name for key lookup.
    pub name: Option<String>,
    pub data: KeyData,
    pub usage: KeyUsage,
    /// Certificate the key was taken from, if any.
    pub certificate: Option<Certificate>,
}

impl Key {
    pub fn new(data: KeyData, usage: KeyUsage) -> Self {
        Self {
            name: None,
            data,
            usage,
            certificate: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Convert to a `SigningKey` for use with crypto algorithms.
    pub fn to_signing_key(&self) -> SigningKey {
        match &self.data {
            KeyData::Rsa { private: Some(pk), .. } => SigningKey::Rsa(pk.clone()),
            KeyData::Rsa { public, .. } => SigningKey::RsaPublic(public.clone()),
            KeyData::EcP256 { private: Some(sk), .. } => SigningKey::EcP256(sk.clone()),
            KeyData::EcP256 { public, .. } => SigningKey::EcP256Public(*public),
            KeyData::EcP384 { private: Some(sk), .. } => SigningKey::EcP384(sk.clone()),
            KeyData::EcP384 { public, .. } => SigningKey::EcP384Public(*public),
            KeyData::Hmac(k) => SigningKey::Hmac(k.clone()),
        }
    }

    /// Get the raw symmetric key bytes.
    pub fn symmetric_key_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            KeyData::Hmac(k) => Some(k),
            _ => None,
        }
    }
}
