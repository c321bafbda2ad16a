#![forbid(unsafe_code)]

//! A single file holding a chain of PEM `CERTIFICATE` blocks.
//!
//! The bundle is one unit of trust material: if it cannot be read or parsed
//! the whole source fails. Individual certificates outside their validity
//! interval are still skipped.

use super::{admit, CertificateSource};
use crate::cert::Certificate;
use crate::diag::{default_sink, DiagnosticSink};
use der::Encode;
use sigill_core::StorageResolverError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct PemBundleSource {
    path: PathBuf,
    certs: Vec<Certificate>,
}

impl PemBundleSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageResolverError> {
        Self::open_with(path, default_sink().as_ref(), SystemTime::now())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        sink: &dyn DiagnosticSink,
        at: SystemTime,
    ) -> Result<Self, StorageResolverError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|source| StorageResolverError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let invalid = |reason: String| StorageResolverError::Invalid {
            path: path.clone(),
            reason,
        };

        let chain = x509_cert::Certificate::load_pem_chain(&data)
            .map_err(|e| invalid(format!("not a PEM certificate bundle: {e}")))?;
        let mut certs = Vec::with_capacity(chain.len());
        for parsed in chain {
            let der = parsed
                .to_der()
                .map_err(|e| invalid(format!("cannot re-encode certificate: {e}")))?;
            let cert = Certificate::from_der(&der).map_err(|e| invalid(e.to_string()))?;
            if let Some(cert) = admit(cert, &path, sink, at) {
                certs.push(cert);
            }
        }

        tracing::debug!(path = %path.display(), loaded = certs.len(), "loaded certificate bundle");
        Ok(Self { path, certs })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CertificateSource for PemBundleSource {
    fn certificates(&self) -> &[Certificate] {
        &self.certs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::tests::mint;
    use crate::diag::{RecordingSink, SkipReason};

    #[test]
    fn test_bundle_skips_expired_member() {
        let a = mint("a", 1, 2020, 2090);
        let old = mint("old", 2, 2000, 2001);
        let b = mint("b", 3, 2020, 2090);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, format!("{}{}{}", a.pem, old.pem, b.pem).as_bytes()).unwrap();

        let sink = RecordingSink::new();
        let source = PemBundleSource::open_with(file.path(), sink.as_ref(), SystemTime::now()).unwrap();
        let subjects: Vec<_> = source.certificates().iter().map(|c| c.subject()).collect();
        assert_eq!(subjects, vec!["CN=a", "CN=b"]);
        assert_eq!(sink.skipped()[0].1, SkipReason::Expired);
    }

    #[test]
    fn test_unparseable_bundle_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
        )
        .unwrap();
        assert!(matches!(
            PemBundleSource::open(file.path()),
            Err(StorageResolverError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_bundle_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PemBundleSource::open(dir.path().join("absent.pem")),
            Err(StorageResolverError::Unreadable { .. })
        ));
    }
}
