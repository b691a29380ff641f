//! Job and outcome types for the download engine

use std::fmt;
use thiserror::Error;
use url::Url;

/// Kind of asset a job downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Style,
    Script,
    Image,
    Font,
    /// Web app manifests and icons referenced by `<link>`
    Manifest,
    /// Data preloaded with `as="fetch"`
    Json,
}

impl AssetKind {
    /// Priority tier of the kind
    pub fn tier(&self) -> Tier {
        match self {
            Self::Style | Self::Script | Self::Manifest | Self::Json => Tier::Critical,
            Self::Image | Self::Font => Tier::Deferred,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Manifest => "manifest",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling tier; critical jobs always run before deferred ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Deferred,
    Critical,
}

/// One unit of download work
///
/// A job is identified by its canonical URL. Every raw reference string that
/// resolved to that URL is kept in `origins` so the rewriter can replace each
/// of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Canonical absolute URL (fragment removed)
    pub url: Url,
    pub kind: AssetKind,
    /// Raw reference strings as they appear in the referring text
    pub origins: Vec<String>,
    /// Base the references were resolved against
    pub base: Url,
    /// Number of failed attempts so far
    pub retry_count: u32,
}

impl Job {
    pub fn new(url: Url, kind: AssetKind, origin: impl Into<String>, base: Url) -> Self {
        Self {
            url,
            kind,
            origins: vec![origin.into()],
            base,
            retry_count: 0,
        }
    }

    /// Dedup key
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    pub fn tier(&self) -> Tier {
        self.kind.tier()
    }

    /// Attempt number of the next execution, starting at 1
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// Records another origin string, ignoring duplicates
    pub fn add_origin(&mut self, origin: impl Into<String>) {
        let origin = origin.into();
        if !origin.is_empty() && !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
    }
}

/// Failure of a single asset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("failed to store {path}: {message}")]
    Storage { path: String, message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{0} was abandoned before completion")]
    Abandoned(String),
}

impl AssetError {
    /// Transport errors, non-success statuses and body-read errors are retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Status { .. } | Self::Body { .. }
        )
    }
}

/// Result of a job: the stored path on success
pub type AssetResult = Result<String, AssetError>;

/// Terminal record of a job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: Job,
    /// Attempts made, the successful one included
    pub attempts: u32,
    pub result: AssetResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_tiers() {
        assert_eq!(AssetKind::Style.tier(), Tier::Critical);
        assert_eq!(AssetKind::Script.tier(), Tier::Critical);
        assert_eq!(AssetKind::Manifest.tier(), Tier::Critical);
        assert_eq!(AssetKind::Json.tier(), Tier::Critical);
        assert_eq!(AssetKind::Image.tier(), Tier::Deferred);
        assert_eq!(AssetKind::Font.tier(), Tier::Deferred);
        assert!(Tier::Critical > Tier::Deferred);
    }

    #[test]
    fn test_add_origin_dedups() {
        let base = url("https://x.com/");
        let mut job = Job::new(url("https://x.com/a.css"), AssetKind::Style, "a.css", base);
        job.add_origin("/a.css");
        job.add_origin("a.css");
        job.add_origin("");

        assert_eq!(job.origins, vec!["a.css".to_string(), "/a.css".to_string()]);
        assert_eq!(job.attempt(), 1);
    }

    #[test]
    fn test_retryable_classification() {
        let net = AssetError::Network {
            url: "u".into(),
            message: "timed out".into(),
        };
        let status = AssetError::Status {
            url: "u".into(),
            status: 404,
        };
        let storage = AssetError::Storage {
            path: "p".into(),
            message: "disk full".into(),
        };

        assert!(net.is_retryable());
        assert!(status.is_retryable());
        assert!(!storage.is_retryable());
        assert!(!AssetError::InvalidUrl("x".into()).is_retryable());
    }
}
