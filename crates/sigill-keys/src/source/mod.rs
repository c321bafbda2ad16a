#![forbid(unsafe_code)]

//! Certificate sources.
//!
//! A source loads its certificates once, at construction, and never
//! re-scans. Only certificates inside their validity interval at load time
//! are kept; everything else is reported to the diagnostic sink and
//! dropped. Construction fails only when the backing store as a whole is
//! unusable.

mod bundle;
mod directory;

pub use bundle::PemBundleSource;
pub use directory::DirectorySource;

use crate::cert::Certificate;
use crate::diag::{default_sink, Diagnostic, DiagnosticSink};
use std::path::Path;
use std::time::SystemTime;

/// A finite, order-preserving collection of time-valid certificates.
pub trait CertificateSource: Send + Sync {
    /// Retained certificates in load order. Each call starts over.
    fn certificates(&self) -> &[Certificate];

    fn len(&self) -> usize {
        self.certificates().len()
    }

    fn is_empty(&self) -> bool {
        self.certificates().is_empty()
    }
}

/// Keep `cert` if it is valid at `at`, reporting the outcome either way.
pub(crate) fn admit(
    cert: Certificate,
    origin: &Path,
    sink: &dyn DiagnosticSink,
    at: SystemTime,
) -> Option<Certificate> {
    match cert.check_validity(at) {
        Ok(()) => {
            sink.report(Diagnostic::CertificateLoaded {
                origin: origin.to_path_buf(),
                subject: cert.subject(),
            });
            Some(cert)
        }
        Err(reason) => {
            sink.report(Diagnostic::CertificateSkipped {
                origin: origin.to_path_buf(),
                reason,
            });
            None
        }
    }
}

// ── Single certificate ───────────────────────────────────────────────

/// Exactly one already parsed certificate, or none if it is not
/// currently valid.
#[derive(Debug, Clone)]
pub struct SingleCertificateSource {
    cert: Option<Certificate>,
}

impl SingleCertificateSource {
    pub fn new(cert: Certificate) -> Self {
        Self::with_options(cert, default_sink().as_ref(), SystemTime::now())
    }

    pub fn with_options(cert: Certificate, sink: &dyn DiagnosticSink, at: SystemTime) -> Self {
        Self {
            cert: admit(cert, Path::new("<single certificate>"), sink, at),
        }
    }
}

impl CertificateSource for SingleCertificateSource {
    fn certificates(&self) -> &[Certificate] {
        self.cert.as_slice()
    }
}

// ── In-memory list ───────────────────────────────────────────────────

/// Certificates the caller parsed itself, admitted under the same
/// validity rule as every other source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    certs: Vec<Certificate>,
}

impl MemorySource {
    pub fn new(certs: impl IntoIterator<Item = Certificate>) -> Self {
        Self::with_options(certs, default_sink().as_ref(), SystemTime::now())
    }

    pub fn with_options(
        certs: impl IntoIterator<Item = Certificate>,
        sink: &dyn DiagnosticSink,
        at: SystemTime,
    ) -> Self {
        let origin = Path::new("<memory>");
        Self {
            certs: certs
                .into_iter()
                .filter_map(|c| admit(c, origin, sink, at))
                .collect(),
        }
    }
}

impl CertificateSource for MemorySource {
    fn certificates(&self) -> &[Certificate] {
        &self.certs
    }
}
