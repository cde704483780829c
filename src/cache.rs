//! Normalize-once, query-many cache for datasets loaded from disk.

use crate::error::Result;
use crate::schema::CanonicalDataset;
use crate::SalesPipeline;
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    /// Without a modification time the metadata alone proves nothing.
    fn matches(&self, other: &Fingerprint) -> bool {
        self.modified.is_some() && self == other
    }
}

struct CacheEntry {
    fingerprint: Fingerprint,
    digest: [u8; 32],
    dataset: Arc<CanonicalDataset>,
}

/// Keeps one normalized dataset per path.
///
/// A cached dataset is reused while the file's length and modification time
/// are unchanged. When they change, the file content is hashed and the
/// dataset is only rebuilt if the content itself differs.
pub struct DatasetCache {
    pipeline: SalesPipeline,
    entries: HashMap<PathBuf, CacheEntry>,
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(SalesPipeline::default())
    }
}

impl DatasetCache {
    pub fn new(pipeline: SalesPipeline) -> Self {
        Self {
            pipeline,
            entries: HashMap::new(),
        }
    }

    pub fn pipeline(&self) -> &SalesPipeline {
        &self.pipeline
    }

    pub fn get_or_load(&mut self, path: impl AsRef<Path>) -> Result<Arc<CanonicalDataset>> {
        let path = path.as_ref();
        let fingerprint = Fingerprint::of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.fingerprint.matches(&fingerprint) {
                debug!("Cache hit for {}", path.display());
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        let bytes = fs::read(path)?;
        let digest = content_digest(&bytes);

        if let Some(entry) = self.entries.get_mut(path) {
            if entry.digest == digest {
                debug!(
                    "Metadata of {} changed but content did not; reusing dataset",
                    path.display()
                );
                entry.fingerprint = fingerprint;
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        let dataset = Arc::new(self.pipeline.load_bytes(&bytes, &path.display().to_string())?);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                fingerprint,
                digest,
                dataset: Arc::clone(&dataset),
            },
        );

        Ok(dataset)
    }

    /// Drops the entry for `path`. Returns whether one was cached.
    pub fn invalidate(&mut self, path: impl AsRef<Path>) -> bool {
        self.entries.remove(path.as_ref()).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn content_digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SalesInsightError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SALES: &str = "date,customer,product,quantity,amount\n\
                         2025-01-01,C1,Hielo,1,100\n\
                         2025-01-02,C2,Agua,2,50\n";

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_second_load_reuses_dataset() {
        let file = write_file(SALES);
        let mut cache = DatasetCache::default();

        let first = cache.get_or_load(file.path()).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rewrite_with_same_content_is_reused() {
        let file = write_file(SALES);
        let mut cache = DatasetCache::default();
        let first = cache.get_or_load(file.path()).unwrap();

        fs::write(file.path(), SALES).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_content_is_reloaded() {
        let file = write_file(SALES);
        let mut cache = DatasetCache::default();
        let first = cache.get_or_load(file.path()).unwrap();

        let updated = format!("{}2025-01-03,C3,Hielo,1,25\n", SALES);
        fs::write(file.path(), updated).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 3);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let file = write_file(SALES);
        let mut cache = DatasetCache::default();
        let first = cache.get_or_load(file.path()).unwrap();

        assert!(cache.invalidate(file.path()));
        assert!(!cache.contains(file.path()));
        assert!(!cache.invalidate(file.path()));

        let second = cache.get_or_load(file.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DatasetCache::default();
        let err = cache.get_or_load(dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, SalesInsightError::IoError(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let file = write_file("fecha,cliente\n2025-01-01,C1\n");
        let mut cache = DatasetCache::default();
        let err = cache.get_or_load(file.path()).unwrap_err();
        assert!(matches!(err, SalesInsightError::SchemaMismatch { .. }));
        assert!(cache.is_empty());
    }
}
