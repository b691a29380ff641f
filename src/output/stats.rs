//! Run summary of a mirror operation
//!
//! This module provides the summary built from a finished worker pool and
//! its console rendering.

use crate::engine::{AssetKind, PoolReport};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::time::Duration;

/// An asset that could not be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAsset {
    pub url: String,
    pub kind: AssetKind,
    /// Attempts made before giving up
    pub attempts: u32,
    pub error: String,
}

/// Summary of one mirror run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// When discovery started
    pub started_at: DateTime<Utc>,

    /// Time spent in the worker pool
    pub elapsed: Duration,

    /// Number of assets stored
    pub successful: usize,

    /// Number of assets that failed terminally
    pub failed: usize,

    /// Failed assets, sorted by URL
    pub failures: Vec<FailedAsset>,
}

impl RunSummary {
    /// Builds the summary from a finished pool
    pub fn from_report(started_at: DateTime<Utc>, report: &PoolReport) -> Self {
        let mut failures: Vec<FailedAsset> = report
            .failures
            .iter()
            .map(|outcome| FailedAsset {
                url: outcome.job.url.to_string(),
                kind: outcome.job.kind,
                attempts: outcome.attempts,
                error: outcome
                    .result
                    .as_ref()
                    .err()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            })
            .collect();
        failures.sort_by(|a, b| a.url.cmp(&b.url));

        Self {
            started_at,
            elapsed: report.elapsed,
            successful: report.succeeded,
            failed: report.failed,
            failures,
        }
    }

    /// Total number of assets that reached a terminal state
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }

    /// Failures other than fonts
    pub fn critical_failures(&self) -> impl Iterator<Item = &FailedAsset> {
        self.failures.iter().filter(|f| f.kind != AssetKind::Font)
    }
}

/// Renders the summary as console text
///
/// Non-font failures are listed one per line; font failures are only counted.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Mirror Summary ===\n");
    let _ = writeln!(out, "Started: {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    let _ = writeln!(out, "Assets stored: {}", summary.successful);
    let _ = writeln!(out, "Assets failed: {}", summary.failed);

    let critical: Vec<&FailedAsset> = summary.critical_failures().collect();
    if !critical.is_empty() {
        let _ = writeln!(out, "\nFailed assets:");
        for failure in critical {
            let _ = writeln!(
                out,
                "  [{}] {} ({} attempts): {}",
                failure.kind, failure.url, failure.attempts, failure.error
            );
        }
    }

    let fonts = summary.failed - summary.critical_failures().count();
    if fonts > 0 {
        let _ = writeln!(out, "\nFonts unavailable: {}", fonts);
    }

    out
}

/// Prints the summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", render_summary(summary));
}
