//! Output module for run summaries
//!
//! This module handles:
//! - Building the summary of a finished mirror run
//! - Rendering it for the console

pub mod stats;

pub use stats::{print_summary, render_summary, FailedAsset, RunSummary};
