#![forbid(unsafe_code)]

//! Storage resolver: certificate sources behind one iteration contract.

use crate::cert::Certificate;
use crate::source::CertificateSource;

/// Read-only concatenation of certificate sources.
///
/// Iteration yields every certificate of the first registered source, then
/// the second, and so on. Duplicates across sources are kept.
#[derive(Default)]
pub struct StorageResolver {
    sources: Vec<Box<dyn CertificateSource>>,
}

impl StorageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: impl CertificateSource + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Builder form of [`StorageResolver::add`].
    pub fn with(mut self, source: impl CertificateSource + 'static) -> Self {
        self.add(source);
        self
    }

    /// Lazy pass over all certificates.
    pub fn iter(&self) -> impl Iterator<Item = &Certificate> + '_ {
        self.sources.iter().flat_map(|s| s.certificates().iter())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Total certificates across all sources, duplicates included.
    pub fn len(&self) -> usize {
        self.sources.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for StorageResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageResolver")
            .field("sources", &self.sources.len())
            .field("certificates", &self.len())
            .finish()
    }
}
