//! Filesystem storage backend
//!
//! Files are written to a temporary file in the destination directory and then
//! renamed into place, so a crash never leaves a truncated asset behind.

use crate::storage::naming::ASSETS_DIR;
use crate::storage::traits::{check_relative, StorageError, StorageResult, StorageSink};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directories created below the root by [`FsStorage::prepare`]
const LAYOUT: &[&str] = &["assets", "assets/images", "assets/fonts"];

/// Stores assets below a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Opens a storage rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Prepares the mirror layout
    ///
    /// Cleaning only removes what a previous mirror wrote: the `assets/`
    /// tree and the document file. Anything else in `root` is left alone.
    /// A root that is the working directory or one of its ancestors is
    /// never cleaned.
    ///
    /// # Arguments
    ///
    /// * `root` - Output directory
    /// * `document` - File name of the mirrored page inside `root`
    /// * `clean` - Remove the previous mirror first
    ///
    /// # Returns
    ///
    /// * `Ok(FsStorage)` - Directory exists with `assets/`, `assets/images/`
    ///   and `assets/fonts/` inside
    /// * `Err(StorageError)` - The root could not be cleaned or created
    pub fn prepare(root: impl Into<PathBuf>, document: &str, clean: bool) -> StorageResult<Self> {
        let root = root.into();
        check_relative(document)?;

        if clean && root.exists() {
            ensure_not_working_directory(&root)?;
            tracing::info!("Removing previous mirror at {}", root.display());

            let assets = root.join(ASSETS_DIR);
            if assets.is_dir() {
                fs::remove_dir_all(&assets)?;
            }
            let page = root.join(document);
            if page.is_file() {
                fs::remove_file(&page)?;
            }
        }

        for dir in LAYOUT {
            fs::create_dir_all(root.join(dir))?;
        }

        Ok(Self { root })
    }
}

fn ensure_not_working_directory(root: &Path) -> StorageResult<()> {
    let root = fs::canonicalize(root)?;
    let cwd = std::env::current_dir().and_then(fs::canonicalize)?;

    if cwd.starts_with(&root) {
        return Err(StorageError::UnsafeClean(root.display().to_string()));
    }
    Ok(())
}

impl StorageSink for FsStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn put(&self, relative_path: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        check_relative(relative_path)?;

        let destination = self.root.join(relative_path);
        let parent = destination
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(relative_path.to_string()))?;
        fs::create_dir_all(parent)?;

        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged
            .persist(&destination)
            .map_err(|e| StorageError::Persist {
                path: destination.display().to_string(),
                source: e.error,
            })?;

        tracing::trace!("Stored {} ({} bytes)", destination.display(), bytes.len());
        Ok(destination)
    }
}
