//! `url(...)` extraction from CSS text

use crate::discovery::JobSet;
use crate::engine::{AssetKind, Job};
use crate::url::{canonicalize, path_extension};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Path extensions treated as fonts
pub const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "eot", "svg"];

// Double-quoted, single-quoted or bare argument, padding allowed
static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("Invalid CSS url regex")
});

/// Every `url(...)` argument in `css`, unquoted and trimmed, in source order
pub fn css_url_references(css: &str) -> Vec<&str> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// True when the URL path ends in a font extension
pub fn is_font_url(url: &Url) -> bool {
    path_extension(url)
        .map(|ext| FONT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Finds the fonts referenced by a stylesheet
///
/// # Arguments
///
/// * `css` - Stylesheet text
/// * `base` - URL relative references resolve against: the stylesheet's own
///   URL for downloaded files, the document base for inline `<style>`
///
/// # Returns
///
/// One font job per canonical URL, with every raw reference that resolved to
/// it as an origin. `data:` URIs and non-font references are skipped.
pub fn scan_stylesheet_fonts(css: &str, base: &Url) -> Vec<Job> {
    let mut fonts = JobSet::new();

    for reference in css_url_references(css) {
        let Some(url) = canonicalize(base, reference) else {
            continue;
        };
        if is_font_url(&url) {
            fonts.add(url, AssetKind::Font, reference, base);
        }
    }

    fonts.into_jobs()
}
