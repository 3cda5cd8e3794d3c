//! Read-only access to uploaded documents.

mod fs;

pub use fs::FsDocumentStore;

use std::path::PathBuf;

use crate::error::StoreError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage the orchestrator reads documents from.
///
/// Implementations must be safe to call from many invocations at once.
/// The orchestrator never writes through this trait.
pub trait DocumentStore: Send + Sync {
    /// Resolve a document to a path the extractor can read.
    fn open(&self, name: &str) -> Result<PathBuf>;
}

/// Check that a document identifier is a plain file name.
///
/// Rejects empty names, path separators and the `.`/`..` entries, so that a
/// name can never address anything outside the store.
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err("name refers to a directory".to_string());
    }
    if name.contains(['/', '\\']) {
        return Err("name contains a path separator".to_string());
    }
    if name.contains('\0') {
        return Err("name contains a NUL byte".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_plain() {
        assert!(validate_name("invoice.pdf").is_ok());
        assert!(validate_name("faktura 2024-01.png").is_ok());
    }

    #[test]
    fn test_validate_name_rejects_traversal() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../secret.pdf").is_err());
        assert!(validate_name("nested/file.pdf").is_err());
        assert!(validate_name("c:\\file.pdf").is_err());
    }
}
