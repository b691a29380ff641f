//! Reference rewriting
//!
//! This module replaces original references with local paths:
//! - Global, boundary-aware substitution over arbitrary text
//! - Document rewriting from the finished asset map
//! - Injection of the offline error-suppression script

mod error_suppression;

pub use error_suppression::{inject_error_suppression, SUPPRESSION_MARKER};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Maps every origin string to the local path of its stored asset
pub type AssetMap = HashMap<String, String>;

/// Characters that continue a URL to the left of a match
fn continues_left(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '~' | '%' | '\\')
}

/// Characters that continue a URL to the right of a match
fn continues_right(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '~' | '%' | '?' | '#' | '&' | '=' | '+')
}

fn is_delimited(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(continues_left).unwrap_or(false) && !after.map(continues_right).unwrap_or(false)
}

/// Replaces every delimited occurrence of each key with its value
///
/// An occurrence only counts when the characters around it cannot be part of
/// the same URL, so `a.css` is not replaced inside `/x/a.css` or `a.css.map`.
/// Longer keys win where matches overlap. All replacements are computed on
/// the input text, so a replacement value is never rewritten again.
///
/// # Example
///
/// ```
/// use static_mirror::rewrite::rewrite_references;
/// use std::collections::HashMap;
///
/// let mut map = HashMap::new();
/// map.insert("a.css".to_string(), "assets/a.css".to_string());
///
/// let out = rewrite_references(r#"<link href="a.css"><a href="/x/a.css">"#, &map);
/// assert_eq!(out, r#"<link href="assets/a.css"><a href="/x/a.css">"#);
/// ```
pub fn rewrite_references(text: &str, replacements: &HashMap<String, String>) -> String {
    let mut entries: Vec<(&str, &str)> = replacements
        .iter()
        .filter(|(origin, _)| !origin.is_empty())
        .map(|(origin, local)| (origin.as_str(), local.as_str()))
        .collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    // start => (end, replacement)
    let mut claimed: BTreeMap<usize, (usize, &str)> = BTreeMap::new();

    for (origin, local) in entries {
        for (start, _) in text.match_indices(origin) {
            let end = start + origin.len();
            if !is_delimited(text, start, end) {
                continue;
            }

            let overlaps_previous = claimed
                .range(..end)
                .next_back()
                .map(|(_, &(prev_end, _))| prev_end > start)
                .unwrap_or(false);
            if overlaps_previous {
                continue;
            }

            claimed.insert(start, (end, local));
        }
    }

    if claimed.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, (end, local)) in claimed {
        out.push_str(&text[cursor..start]);
        out.push_str(local);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Expresses a stored path relative to the storage root, with `/` separators
pub fn relative_to_root(path: &str, root: &Path) -> String {
    let relative = Path::new(path)
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string());
    relative.replace('\\', "/")
}

/// Rewrites a document from the finished asset map
///
/// Origins without an entry (failed or never scheduled) stay as they were.
///
/// # Arguments
///
/// * `document` - Original document text
/// * `asset_map` - Origin string to stored path
/// * `root` - Storage root, stripped from stored paths
pub fn rewrite_document(document: &str, asset_map: &AssetMap, root: &Path) -> String {
    let relative: HashMap<String, String> = asset_map
        .iter()
        .map(|(origin, path)| (origin.clone(), relative_to_root(path, root)))
        .collect();

    rewrite_references(document, &relative)
}
