use crate::storage::traits::{check_relative, StorageResult, StorageSink};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// In-memory storage, used by tests and by callers that post-process assets
#[derive(Debug, Default)]
pub struct MemoryStorage {
    root: PathBuf,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the file stored at `relative_path`
    pub fn get(&self, relative_path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(relative_path)
            .cloned()
    }

    /// Returns the stored file as UTF-8 text (lossy)
    pub fn get_text(&self, relative_path: &str) -> Option<String> {
        self.get(relative_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Sorted list of stored paths
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageSink for MemoryStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn put(&self, relative_path: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        check_relative(relative_path)?;
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(relative_path.to_string(), bytes.to_vec());
        Ok(PathBuf::from(relative_path))
    }
}
