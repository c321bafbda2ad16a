#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! Three families carry the core's contracts and are surfaced unchanged:
//! [`StorageResolverError`] (a certificate store could not be opened),
//! [`KeyResolverError`] (key resolution failed) and [`SignatureError`]
//! (a signature algorithm policy was violated). Everything else is folded
//! into the crate-wide [`Error`].

use std::path::PathBuf;

/// Errors produced by the Sigill XML Security library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error(transparent)]
    StorageResolver(#[from] StorageResolverError),

    #[error(transparent)]
    KeyResolver(#[from] KeyResolverError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A certificate store could not be constructed.
///
/// Always fatal: a store never silently becomes empty after claiming success.
#[derive(Debug, thiserror::Error)]
pub enum StorageResolverError {
    #[error("cannot list certificate directory {}: {source}", path.display())]
    Unlistable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read certificate store {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate store {} is unusable: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Key resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyResolverError {
    /// No resolver in the chain produced a key. Also returned by an empty chain.
    #[error("no key found")]
    NoKeyFound,

    /// The key information is corrupt in a way no other resolver could
    /// handle. Short-circuits the chain.
    #[error("malformed key information: {0}")]
    Malformed(String),

    /// A resolver-specific, non-fatal failure. The chain moves on.
    #[error("resolver declined: {0}")]
    Declined(String),
}

impl KeyResolverError {
    /// Whether this error stops the resolver chain.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Signature algorithm policy violations. Always fatal to the signing or
/// verification attempt in progress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("{algorithm}: output length {requested} bits is below the minimum of {minimum} bits")]
    OutputLengthBelowMinimum {
        algorithm: &'static str,
        requested: usize,
        minimum: usize,
    },

    #[error("{algorithm}: output length {requested} bits exceeds the digest size of {maximum} bits")]
    OutputLengthExceedsDigest {
        algorithm: &'static str,
        requested: usize,
        maximum: usize,
    },

    #[error("{algorithm}: output length {requested} bits is not a whole number of bytes")]
    OutputLengthNotByteAligned {
        algorithm: &'static str,
        requested: usize,
    },
}
