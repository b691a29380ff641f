//! Asset discovery
//!
//! This module turns a parsed document into the deduplicated list of download
//! jobs, without any network I/O:
//! - `<link>` stylesheets, preloads, manifests and icons
//! - `<script src>` (inline scripts are returned as text for transformation)
//! - `<img>` sources, `srcset` candidates and social-media `<meta>` images
//! - `background-image` in inline `style` attributes
//! - fonts referenced from inline `<style>` blocks and downloaded stylesheets

mod document;
mod stylesheet;

pub use document::{parse_srcset, scan_document, Discovery};
pub use stylesheet::{css_url_references, is_font_url, scan_stylesheet_fonts, FONT_EXTENSIONS};

use crate::engine::{AssetKind, Job};
use std::collections::HashMap;
use url::Url;

/// Ordered job list deduplicated by canonical URL
///
/// Adding a URL a second time merges the origin into the existing job.
#[derive(Debug, Default)]
pub struct JobSet {
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference
    ///
    /// # Returns
    ///
    /// `true` when `url` was not in the set yet
    pub fn add(&mut self, url: Url, kind: AssetKind, origin: &str, base: &Url) -> bool {
        if let Some(&i) = self.index.get(url.as_str()) {
            self.jobs[i].add_origin(origin);
            return false;
        }

        self.index.insert(url.to_string(), self.jobs.len());
        self.jobs
            .push(Job::new(url, kind, origin, base.clone()));
        true
    }

    /// Adds another origin string to a URL already in the set
    pub fn add_origin(&mut self, url: &Url, origin: &str) {
        if let Some(&i) = self.index.get(url.as_str()) {
            self.jobs[i].add_origin(origin);
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }
}
