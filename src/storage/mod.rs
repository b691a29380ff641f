//! Storage module for persisting mirrored assets
//!
//! This module handles everything that touches the output tree, including:
//! - The [`StorageSink`] interface the download engine writes through
//! - A filesystem backend with atomic per-file writes
//! - An in-memory backend for tests and embedding
//! - Local file naming and collision handling

mod fs;
mod memory;
pub mod naming;
mod traits;

pub use fs::FsStorage;
pub use memory::MemoryStorage;
pub use naming::{local_file_name, NameRegistry};
pub use traits::{StorageError, StorageResult, StorageSink};
