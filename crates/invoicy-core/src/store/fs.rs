//! Directory-backed document store.

use std::fs::File;
use std::path::PathBuf;

use tracing::debug;

use super::{DocumentStore, Result, validate_name};
use crate::error::StoreError;

/// Documents addressed by file name inside one directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name).map_err(|reason| StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        Ok(self.root.join(name))
    }
}

impl DocumentStore for FsDocumentStore {
    fn open(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name)?;

        if !path.is_file() {
            debug!("Document {} not found at {}", name, path.display());
            return Err(StoreError::NotFound(name.to_string()));
        }

        // Probe readability now so a permission problem is reported against
        // the document instead of surfacing inside the extractor.
        File::open(&path)?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();

        let store = FsDocumentStore::new(dir.path());
        assert_eq!(store.open("a.pdf").unwrap(), dir.path().join("a.pdf"));
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path());

        assert!(matches!(
            store.open("missing.pdf"),
            Err(StoreError::NotFound(name)) if name == "missing.pdf"
        ));
    }

    #[test]
    fn test_directory_is_not_a_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let store = FsDocumentStore::new(dir.path());
        assert!(matches!(store.open("sub"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_open_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("uploads"));

        assert!(matches!(
            store.open("../a.pdf"),
            Err(StoreError::InvalidName { .. })
        ));
    }
}
