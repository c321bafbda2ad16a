#![forbid(unsafe_code)]

//! Diagnostic side channel.
//!
//! Per-certificate failures and resolver declines are not errors of the
//! public contract. They are reported here so operators can audit which
//! trust material was skipped and why. Sinks are injected into sources and
//! chains; the default routes everything to `tracing`.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Why a certificate was left out of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file vanished or could not be read.
    Unreadable(String),
    /// The bytes are not a certificate.
    Malformed(String),
    NotYetValid,
    Expired,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "unreadable: {e}"),
            Self::Malformed(e) => write!(f, "malformed: {e}"),
            Self::NotYetValid => f.write_str("not yet valid"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    CertificateLoaded { origin: PathBuf, subject: String },
    CertificateSkipped { origin: PathBuf, reason: SkipReason },
    ResolverDeclined { resolver: &'static str, reason: String },
}

/// Receiver for diagnostics. Must tolerate concurrent reports from
/// independently constructed sources.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Forwards diagnostics to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::CertificateLoaded { origin, subject } => {
                tracing::debug!(path = %origin.display(), %subject, "loaded certificate");
            }
            Diagnostic::CertificateSkipped { origin, reason } => {
                tracing::debug!(path = %origin.display(), %reason, "skipped certificate");
            }
            Diagnostic::ResolverDeclined { resolver, reason } => {
                tracing::debug!(resolver, %reason, "key resolver declined");
            }
        }
    }
}

/// Default sink used when the caller does not inject one.
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything reported so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn skipped(&self) -> Vec<(PathBuf, SkipReason)> {
        self.events()
            .into_iter()
            .filter_map(|d| match d {
                Diagnostic::CertificateSkipped { origin, reason } => Some((origin, reason)),
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
