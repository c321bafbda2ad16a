#![forbid(unsafe_code)]

//! Keys, certificate sources and key resolution for the Sigill XML
//! Security library.
//!
//! Certificates are loaded by [`CertificateSource`]s, composed into a
//! [`StorageResolver`], and searched by the [`KeyResolver`]s of a
//! [`KeyResolverChain`] on behalf of the signature engine.

pub mod cert;
pub mod diag;
pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod manager;
pub mod resolver;
pub mod source;
pub mod storage;

pub use cert::Certificate;
pub use diag::{
    default_sink, Diagnostic, DiagnosticSink, RecordingSink, SharedSink, SkipReason, TracingSink,
};
pub use key::{Key, KeyData, KeyUsage};
pub use keyinfo::{KeyInfo, KeyValue, X509Data};
pub use manager::KeysManager;
pub use resolver::{KeyResolver, KeyResolverChain, ResolverKind};
pub use source::{
    CertificateSource, DirectorySource, MemorySource, PemBundleSource, SingleCertificateSource,
};
pub use storage::StorageResolver;
