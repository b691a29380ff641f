//! Local file naming
//!
//! Maps a downloaded asset to its path below the storage root:
//! - stylesheets, scripts and manifests go to `assets/`
//! - images go to `assets/images/`
//! - fonts go to `assets/fonts/`
//!
//! The [`NameRegistry`] keeps the mapping stable per canonical URL and
//! disambiguates two different URLs that share a file name.

use crate::engine::AssetKind;
use crate::url::last_segment;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// Directory (relative to the storage root) that holds top-level assets
pub const ASSETS_DIR: &str = "assets";

/// Directory (relative to the storage root) that holds images
pub const IMAGES_DIR: &str = "assets/images";

/// Directory (relative to the storage root) that holds fonts
pub const FONTS_DIR: &str = "assets/fonts";

/// Computes the storage-relative path for an asset
///
/// # Arguments
///
/// * `kind` - Kind of the asset
/// * `url` - Final URL of the response (after redirects)
/// * `content_type` - `Content-Type` header, used when the path has no extension
///
/// # Returns
///
/// A forward-slash separated path such as `assets/images/photo.jpg`
pub fn local_file_name(kind: AssetKind, url: &Url, content_type: Option<&str>) -> String {
    let segment = sanitize(last_segment(url));

    match kind {
        AssetKind::Style => format!("{}/{}", ASSETS_DIR, with_suffix(&segment, "index", ".css")),
        AssetKind::Script => format!("{}/{}", ASSETS_DIR, with_suffix(&segment, "index", ".js")),
        AssetKind::Manifest | AssetKind::Json => {
            let name = if segment.is_empty() { "index".to_string() } else { segment };
            if has_extension(&name) {
                format!("{}/{}", ASSETS_DIR, name)
            } else {
                let ext = content_type
                    .and_then(extension_for_mime)
                    .unwrap_or("json");
                format!("{}/{}.{}", ASSETS_DIR, name, ext)
            }
        }
        AssetKind::Image => {
            let name = if segment.is_empty() { "image".to_string() } else { segment };
            if has_extension(&name) {
                format!("{}/{}", IMAGES_DIR, name)
            } else {
                format!("{}/{}{}", IMAGES_DIR, name, image_extension(content_type))
            }
        }
        AssetKind::Font => {
            let name = if segment.is_empty() { "font".to_string() } else { segment };
            format!("{}/{}", FONTS_DIR, name)
        }
    }
}

/// Extension for an image without one in its URL, `.jpg` when unknown
fn image_extension(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        "image/avif" => ".avif",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        _ => ".jpg",
    }
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim();
    if mime.eq_ignore_ascii_case("application/manifest+json") {
        return Some("webmanifest");
    }
    mime_guess::get_mime_extensions_str(mime)?.first().copied()
}

fn with_suffix(segment: &str, fallback: &str, suffix: &str) -> String {
    let name = if segment.is_empty() { fallback } else { segment };
    if name.to_ascii_lowercase().ends_with(suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

fn has_extension(name: &str) -> bool {
    matches!(name.rsplit_once('.'), Some((stem, ext)) if !stem.is_empty() && !ext.is_empty())
}

/// Replaces characters that would need escaping in a local reference
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Assigns unique local names to canonical URLs
///
/// The first URL to claim a name keeps it; later URLs wanting the same name
/// get `stem-2.ext`, `stem-3.ext` and so on. Claiming again with the same URL
/// always returns the name it got first.
#[derive(Debug, Default)]
pub struct NameRegistry {
    state: Mutex<NameState>,
}

#[derive(Debug, Default)]
struct NameState {
    by_url: HashMap<String, String>,
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the name for `canonical`, reserving `desired` (or a variant)
    pub fn claim(&self, canonical: &str, desired: &str) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = state.by_url.get(canonical) {
            return existing.clone();
        }

        let mut name = desired.to_string();
        let mut counter = 2;
        while state.taken.contains(&name) {
            name = numbered(desired, counter);
            counter += 1;
        }

        state.taken.insert(name.clone());
        state.by_url.insert(canonical.to_string(), name.clone());
        name
    }

    /// Name previously claimed for `canonical`
    pub fn get(&self, canonical: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_url
            .get(canonical)
            .cloned()
    }
}

/// `assets/style.css` + 2 => `assets/style-2.css`
fn numbered(path: &str, counter: u32) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };

    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, counter, ext),
        _ => format!("{}-{}", file, counter),
    };

    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}
