#![forbid(unsafe_code)]

//! Directory of `.crt` files.

use super::{admit, CertificateSource};
use crate::cert::Certificate;
use crate::diag::{default_sink, Diagnostic, DiagnosticSink, SkipReason};
use sigill_core::StorageResolverError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File name suffix selecting certificate files. Case-sensitive.
pub const CERT_SUFFIX: &str = ".crt";

/// Certificates loaded from every `*.crt` file of one directory.
///
/// Files are read in the order the filesystem lists them. A file that cannot
/// be read, does not parse, or is outside its validity interval is skipped
/// with a diagnostic; only a directory that cannot be listed fails.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    certs: Vec<Certificate>,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageResolverError> {
        Self::open_with(dir, default_sink().as_ref(), SystemTime::now())
    }

    /// Load `dir`, reporting to `sink` and checking validity at `at`.
    pub fn open_with(
        dir: impl AsRef<Path>,
        sink: &dyn DiagnosticSink,
        at: SystemTime,
    ) -> Result<Self, StorageResolverError> {
        let dir = dir.as_ref().to_path_buf();
        let unlistable = |source| StorageResolverError::Unlistable {
            path: dir.clone(),
            source,
        };

        let mut certs = Vec::new();
        let mut skipped = 0usize;
        for entry in std::fs::read_dir(&dir).map_err(unlistable)? {
            let path = entry.map_err(unlistable)?.path();
            let is_cert_file = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(CERT_SUFFIX));
            if !is_cert_file {
                continue;
            }
            match load_one(&path) {
                Ok(cert) => match admit(cert, &path, sink, at) {
                    Some(cert) => certs.push(cert),
                    None => skipped += 1,
                },
                Err(reason) => {
                    skipped += 1;
                    sink.report(Diagnostic::CertificateSkipped {
                        origin: path,
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            loaded = certs.len(),
            skipped,
            "scanned certificate directory"
        );
        Ok(Self { dir, certs })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn load_one(path: &Path) -> Result<Certificate, SkipReason> {
    let data = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    Certificate::from_bytes(&data).map_err(|e| SkipReason::Malformed(e.to_string()))
}

impl CertificateSource for DirectorySource {
    fn certificates(&self) -> &[Certificate] {
        &self.certs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::tests::mint;
    use crate::diag::RecordingSink;

    #[test]
    fn test_mixed_directory_keeps_only_valid() {
        let dir = tempfile::tempdir().unwrap();
        let valid = mint("valid", 1, 2020, 2090);
        std::fs::write(dir.path().join("valid.crt"), &valid.der).unwrap();
        std::fs::write(dir.path().join("expired.crt"), mint("expired", 2, 2000, 2001).pem).unwrap();
        std::fs::write(dir.path().join("future.crt"), mint("future", 3, 2080, 2090).der).unwrap();
        std::fs::write(dir.path().join("garbage.crt"), b"definitely not DER").unwrap();

        let sink = RecordingSink::new();
        let source = DirectorySource::open_with(dir.path(), sink.as_ref(), SystemTime::now()).unwrap();

        assert_eq!(source.len(), 1);
        assert_eq!(source.certificates()[0].der(), &valid.der[..]);

        let mut reasons: Vec<_> = sink.skipped().into_iter().map(|(_, r)| r).collect();
        reasons.sort_by_key(|r| r.to_string());
        assert_eq!(reasons.len(), 3);
        assert!(reasons.contains(&SkipReason::Expired));
        assert!(reasons.contains(&SkipReason::NotYetValid));
        assert!(reasons.iter().any(|r| matches!(r, SkipReason::Malformed(_))));
    }

    #[test]
    fn test_suffix_filter_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cert = mint("x", 1, 2020, 2090);
        std::fs::write(dir.path().join("upper.CRT"), &cert.der).unwrap();
        std::fs::write(dir.path().join("cert.pem"), &cert.pem).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let sink = RecordingSink::new();
        let source = DirectorySource::open_with(dir.path(), sink.as_ref(), SystemTime::now()).unwrap();
        assert!(source.is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_listing_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["c", "a", "b", "d"].iter().enumerate() {
            let cert = mint(name, i as u64 + 1, 2020, 2090);
            std::fs::write(dir.path().join(format!("{name}.crt")), &cert.der).unwrap();
        }
        let listed: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path().file_stem().unwrap().to_string_lossy().into_owned())
            .collect();

        let source = DirectorySource::open(dir.path()).unwrap();
        let loaded: Vec<String> = source
            .certificates()
            .iter()
            .map(|c| c.subject().trim_start_matches("CN=").to_owned())
            .collect();
        assert_eq!(loaded, listed);

        // restartable
        assert_eq!(source.certificates().len(), source.certificates().len());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DirectorySource::open(&missing),
            Err(StorageResolverError::Unlistable { .. })
        ));
    }

    #[test]
    fn test_unreadable_entry_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("subdir.crt")).unwrap();
        std::fs::write(dir.path().join("ok.crt"), mint("ok", 1, 2020, 2090).der).unwrap();

        let sink = RecordingSink::new();
        let source = DirectorySource::open_with(dir.path(), sink.as_ref(), SystemTime::now()).unwrap();
        assert_eq!(source.len(), 1);
        assert!(matches!(sink.skipped()[0].1, SkipReason::Unreadable(_)));
    }
}
