//! Static-Mirror: a single-page offline mirror
//!
//! This crate fetches every resource a web document references (stylesheets,
//! scripts, images, fonts, manifests), persists them through a storage sink and
//! rewrites the document so that it renders from the local copies.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod output;
pub mod rewrite;
pub mod storage;
pub mod transform;
pub mod url;

use thiserror::Error;

/// Main error type for Static-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] engine::SchedulerError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Static-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{AssetKind, Job, Mirror, MirrorOutput};
pub use output::RunSummary;
pub use storage::{FsStorage, MemoryStorage, StorageSink};
pub use crate::url::resolve_reference;
