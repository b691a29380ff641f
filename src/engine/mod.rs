//! Download engine
//!
//! This module contains everything that moves bytes, including:
//! - Job and outcome types
//! - The two-tier job queue and the worker pool with retries
//! - The HTTP fetcher
//! - Per-kind asset processing (CSS fonts, script stylesheet literals)
//! - Progress reporting
//! - The [`Mirror`] coordinator

mod fetcher;
mod job;
mod mirror;
mod processor;
mod progress;
mod queue;
mod registry;
mod scheduler;

pub use fetcher::{build_http_client, fetch_asset, fetch_document, FetchedAsset};
pub use job::{AssetError, AssetKind, AssetResult, Job, JobOutcome, Tier};
pub use mirror::{localize_document, Mirror, MirrorOutput};
pub use processor::AssetProcessor;
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use scheduler::{
    Completion, Dispatcher, Execution, JobExecutor, PoolReport, PoolSettings, Scheduler,
    SchedulerError,
};
