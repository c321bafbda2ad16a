#![forbid(unsafe_code)]

//! Key resolvers and the resolver chain.
//!
//! A [`KeyResolver`] looks at [`KeyInfo`] (and optionally a
//! [`StorageResolver`]) and either produces a key, has nothing to say
//! (`Ok(None)`), declines with a reason, or reports malformed input.
//! [`KeyResolverChain`] tries resolvers strictly in the order given and
//! commits to the first key.

mod embedded;
mod key_name;
mod x509;

pub use embedded::{KeyValueResolver, X509CertificateResolver};
pub use key_name::KeyNameResolver;
pub use x509::{
    CertCriterion, StorageScanResolver, X509IssuerSerialResolver, X509SkiResolver,
    X509SubjectNameResolver,
};

use crate::diag::{default_sink, Diagnostic, SharedSink};
use crate::key::Key;
use crate::keyinfo::KeyInfo;
use crate::manager::KeysManager;
use crate::storage::StorageResolver;
use sigill_core::KeyResolverError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One key discovery strategy.
pub trait KeyResolver: Send + Sync {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError>;
}

// ── Chain ────────────────────────────────────────────────────────────

/// Ordered resolvers. The first one that yields a key wins.
pub struct KeyResolverChain {
    resolvers: Vec<Box<dyn KeyResolver>>,
    sink: SharedSink,
}

impl KeyResolverChain {
    /// An empty chain. Resolving with it always fails with `NoKeyFound`.
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            sink: default_sink(),
        }
    }

    /// key-value, x509-certificate, x509-ski, x509-issuer-serial,
    /// x509-subject-name.
    pub fn default_chain() -> Self {
        Self::from_kinds(ResolverKind::DEFAULT_ORDER, None)
    }

    /// Build a chain in exactly the order of `kinds`. `manager` backs
    /// `key-name`; without one that resolver finds nothing.
    pub fn from_kinds(kinds: &[ResolverKind], manager: Option<Arc<KeysManager>>) -> Self {
        let manager = manager.unwrap_or_default();
        let mut chain = Self::new();
        for kind in kinds {
            chain.push_boxed(kind.build(&manager));
        }
        chain
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn push(&mut self, resolver: impl KeyResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn push_boxed(&mut self, resolver: Box<dyn KeyResolver>) {
        self.resolvers.push(resolver);
    }

    /// Builder form of [`KeyResolverChain::push`].
    pub fn with(mut self, resolver: impl KeyResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Run each resolver at most once, in order.
    ///
    /// `Malformed` stops the chain and is returned unchanged. `Declined` is
    /// reported to the sink and the next resolver is tried. When nothing
    /// yields a key the result is `NoKeyFound`, whether the chain was empty
    /// or every resolver declined.
    pub fn resolve(
        &self,
        key_info: &KeyInfo,
        storage: Option<&StorageResolver>,
    ) -> Result<Key, KeyResolverError> {
        for resolver in &self.resolvers {
            match resolver.resolve(key_info, storage) {
                Ok(Some(key)) => {
                    tracing::debug!(resolver = resolver.name(), key = ?key.data, "key resolved");
                    return Ok(key);
                }
                Ok(None) => {}
                Err(KeyResolverError::Declined(reason)) => {
                    self.sink.report(Diagnostic::ResolverDeclined {
                        resolver: resolver.name(),
                        reason,
                    });
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => {}
            }
        }
        Err(KeyResolverError::NoKeyFound)
    }
}

impl Default for KeyResolverChain {
    fn default() -> Self {
        Self::default_chain()
    }
}

impl fmt::Debug for KeyResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Built-in resolver identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    KeyValue,
    X509Certificate,
    X509Ski,
    X509IssuerSerial,
    X509SubjectName,
    StorageScan,
    KeyName,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key resolver `{0}`")]
pub struct UnknownResolverKind(pub String);

impl ResolverKind {
    pub const ALL: &'static [ResolverKind] = &[
        Self::KeyValue,
        Self::X509Certificate,
        Self::X509Ski,
        Self::X509IssuerSerial,
        Self::X509SubjectName,
        Self::StorageScan,
        Self::KeyName,
    ];

    pub const DEFAULT_ORDER: &'static [ResolverKind] = &[
        Self::KeyValue,
        Self::X509Certificate,
        Self::X509Ski,
        Self::X509IssuerSerial,
        Self::X509SubjectName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyValue => "key-value",
            Self::X509Certificate => "x509-certificate",
            Self::X509Ski => "x509-ski",
            Self::X509IssuerSerial => "x509-issuer-serial",
            Self::X509SubjectName => "x509-subject-name",
            Self::StorageScan => "storage-scan",
            Self::KeyName => "key-name",
        }
    }

    fn build(self, manager: &Arc<KeysManager>) -> Box<dyn KeyResolver> {
        match self {
            Self::KeyValue => Box::new(KeyValueResolver),
            Self::X509Certificate => Box::new(X509CertificateResolver),
            Self::X509Ski => Box::new(X509SkiResolver),
            Self::X509IssuerSerial => Box::new(X509IssuerSerialResolver),
            Self::X509SubjectName => Box::new(X509SubjectNameResolver),
            Self::StorageScan => Box::new(StorageScanResolver),
            Self::KeyName => Box::new(KeyNameResolver::new(Arc::clone(manager))),
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolverKind {
    type Err = UnknownResolverKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownResolverKind(s.to_owned()))
    }
}
