//! Mirror coordinator - one document in, one localized document out
//!
//! This module ties the pipeline together:
//! - Scanning the document for assets
//! - Resolving stylesheet literals of inline scripts
//! - Running the worker pool until the work fixed point
//! - Rewriting the document from the finished asset map

use crate::config::{validate, Config, MAX_WORKERS};
use crate::discovery::scan_document;
use crate::engine::fetcher::{build_http_client, fetch_document};
use crate::engine::job::{AssetKind, Job};
use crate::engine::processor::AssetProcessor;
use crate::engine::progress::{LogProgress, ProgressSink};
use crate::engine::scheduler::{PoolReport, PoolSettings, Scheduler};
use crate::output::RunSummary;
use crate::rewrite::{rewrite_document, AssetMap};
use crate::storage::{NameRegistry, StorageSink};
use crate::transform::find_stylesheet_references;
use crate::{MirrorError, Result};
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Result of localizing one document
#[derive(Debug, Clone)]
pub struct MirrorOutput {
    /// Document text with every stored reference pointing at its local copy
    pub document: String,
    /// Origin string to stored path
    pub asset_map: AssetMap,
    pub summary: RunSummary,
}

/// Localizes documents into a storage sink
pub struct Mirror {
    settings: PoolSettings,
    client: Client,
    progress: Arc<dyn ProgressSink>,
}

impl Mirror {
    /// Creates a mirror from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Pool, retry and user agent settings
    ///
    /// # Returns
    ///
    /// * `Ok(Mirror)` - Ready to localize documents
    /// * `Err(MirrorError)` - The configuration is invalid or the HTTP client
    ///   could not be built
    pub fn new(config: &Config) -> Result<Self> {
        validate(config)?;
        let client = build_http_client(&config.user_agent, &config.scraper)?;

        Ok(Self {
            settings: PoolSettings::from(&config.scraper),
            client,
            progress: Arc::new(LogProgress),
        })
    }

    /// Replaces the progress sink (defaults to [`LogProgress`])
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Overrides the number of workers, clamped to 1-100
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.settings.workers = workers.clamp(1, MAX_WORKERS as usize);
        self
    }

    /// Fetches the root document with the mirror's HTTP client
    ///
    /// # Returns
    ///
    /// The document text and its final URL, which becomes the base URL
    pub async fn fetch_document(&self, url: &str) -> Result<(String, Url)> {
        fetch_document(&self.client, url).await
    }

    /// Downloads everything `document` references and rewrites it
    ///
    /// Individual asset failures never fail the call: the affected references
    /// stay as they were and the failure is listed in the summary.
    ///
    /// # Arguments
    ///
    /// * `document` - Document text
    /// * `base` - Base URL references are resolved against
    /// * `storage` - Where assets are written
    pub async fn localize(
        &self,
        document: &str,
        base: &Url,
        storage: Arc<dyn StorageSink>,
    ) -> Result<MirrorOutput> {
        let started_at = Utc::now();
        let discovery = scan_document(document, base);

        let mut jobs = discovery.jobs;
        for script in &discovery.inline_scripts {
            for reference in find_stylesheet_references(script, base) {
                jobs.push(Job::new(
                    reference.url,
                    AssetKind::Style,
                    reference.literal,
                    base.clone(),
                ));
            }
        }

        tracing::info!("Mirroring {} assets with {} workers", jobs.len(), self.settings.workers);

        let processor = AssetProcessor::new(
            self.client.clone(),
            storage.clone(),
            Arc::new(NameRegistry::new()),
        );
        let scheduler = Scheduler::start(
            self.settings.clone(),
            Arc::new(processor),
            self.progress.clone(),
        );

        for job in jobs {
            scheduler.submit(job).await?;
        }

        let report: PoolReport = scheduler.collect().await;
        let document = rewrite_document(document, &report.asset_map, storage.root());
        let summary = RunSummary::from_report(started_at, &report);

        tracing::info!(
            "Finished: {} stored, {} failed in {:.2?}",
            summary.successful,
            summary.failed,
            summary.elapsed
        );

        Ok(MirrorOutput {
            document,
            asset_map: report.asset_map,
            summary,
        })
    }
}

/// Localizes a document with default settings and `workers` workers
///
/// # Arguments
///
/// * `document` - Document text
/// * `base` - Absolute base URL
/// * `workers` - Pool size, clamped to 1-100
/// * `storage` - Where assets are written
/// * `progress` - Receives `(completed, total)` snapshots
///
/// # Example
///
/// ```no_run
/// use static_mirror::engine::{localize_document, LogProgress};
/// use static_mirror::MemoryStorage;
/// use std::sync::Arc;
///
/// # async fn run() -> static_mirror::Result<()> {
/// let storage = Arc::new(MemoryStorage::new());
/// let output = localize_document(
///     r#"<link rel="stylesheet" href="/a.css">"#,
///     "https://example.com/",
///     8,
///     storage,
///     Arc::new(LogProgress),
/// )
/// .await?;
/// println!("{}", output.document);
/// # Ok(())
/// # }
/// ```
pub async fn localize_document(
    document: &str,
    base: &str,
    workers: usize,
    storage: Arc<dyn StorageSink>,
    progress: Arc<dyn ProgressSink>,
) -> Result<MirrorOutput> {
    let base = Url::parse(base).map_err(|source| MirrorError::InvalidBaseUrl {
        url: base.to_string(),
        source,
    })?;

    Mirror::new(&Config::default())?
        .with_workers(workers)
        .with_progress(progress)
        .localize(document, &base, storage)
        .await
}
