//! Storage traits and error types
//!
//! This module defines the sink interface the download engine writes through
//! and the associated error type.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while persisting an asset
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[error("Refusing to clean {0}: it contains the working directory")]
    UnsafeClean(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for downloaded and transformed assets
///
/// Implementations must be safe to share between workers: every `put`
/// may run concurrently with any other `put`.
pub trait StorageSink: Send + Sync {
    /// Root every stored path lives under
    ///
    /// The rewriter strips this prefix so that references in the document are
    /// relative to the document itself.
    fn root(&self) -> &Path;

    /// Stores `bytes` at `relative_path` below the root
    ///
    /// # Arguments
    ///
    /// * `relative_path` - Forward-slash separated path, e.g. `assets/fonts/a.woff2`
    /// * `bytes` - Complete file contents
    ///
    /// # Returns
    ///
    /// The full path of the stored file (root included). Readers never observe
    /// a partially written file under that path.
    fn put(&self, relative_path: &str, bytes: &[u8]) -> StorageResult<PathBuf>;
}

/// Rejects absolute paths and parent-directory components
pub(crate) fn check_relative(relative_path: &str) -> StorageResult<()> {
    if relative_path.is_empty()
        || relative_path.starts_with('/')
        || relative_path.starts_with('\\')
        || relative_path
            .split(['/', '\\'])
            .any(|part| part == ".." || part.is_empty())
    {
        return Err(StorageError::InvalidPath(relative_path.to_string()));
    }
    Ok(())
}
