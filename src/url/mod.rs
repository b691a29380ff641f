//! URL handling module for Static-Mirror
//!
//! This module provides reference resolution against a document base and the
//! canonical form used to deduplicate download jobs.

mod resolve;

// Re-export main functions
pub use resolve::{canonicalize, is_absolute_http, last_segment, path_extension, resolve_reference};
