use crate::discovery::scan_stylesheet_fonts;
use crate::engine::{AssetKind, Job};
use crate::rewrite::rewrite_references;
use crate::storage::naming::ASSETS_DIR;
use crate::storage::{local_file_name, NameRegistry};
use crate::transform::strip_source_maps;
use std::collections::HashMap;
use url::Url;

/// A stylesheet rewritten to use local fonts
#[derive(Debug)]
pub struct LocalizedStylesheet {
    pub css: String,
    /// Font jobs to dispatch, one per canonical URL
    pub fonts: Vec<Job>,
}

/// Strips source maps and points every font reference at the local copy
///
/// Font names are reserved in `names` up front so the rewritten path matches
/// the file the font job will write, whether or not that job has run yet.
/// Each raw reference is replaced, and so is the resolved URL when it differs.
///
/// # Arguments
///
/// * `css` - Stylesheet text
/// * `base` - Final URL of the stylesheet (document base for inline styles)
/// * `names` - Local name registry shared with the workers
pub fn localize_stylesheet(css: &str, base: &Url, names: &NameRegistry) -> LocalizedStylesheet {
    let css = strip_source_maps(css);
    let fonts = scan_stylesheet_fonts(&css, base);

    let mut replacements = HashMap::new();
    for font in &fonts {
        let local = names.claim(
            font.key(),
            &local_file_name(AssetKind::Font, &font.url, None),
        );
        let relative = relative_to_assets(&local);

        for origin in &font.origins {
            replacements.insert(origin.clone(), with_fragment(&relative, origin));
        }
        replacements
            .entry(font.url.to_string())
            .or_insert_with(|| relative.clone());
    }

    LocalizedStylesheet {
        css: rewrite_references(&css, &replacements),
        fonts,
    }
}

/// Carries a non-empty `#fragment` of `origin` over to `local`
///
/// SVG fonts select the glyph set by id (`font.svg#webfont`).
fn with_fragment(local: &str, origin: &str) -> String {
    match origin.split_once('#') {
        Some((_, fragment)) if !fragment.is_empty() => format!("{}#{}", local, fragment),
        _ => local.to_string(),
    }
}

/// `assets/fonts/a.woff2` => `fonts/a.woff2`, the path seen from a stylesheet
fn relative_to_assets(local: &str) -> String {
    local
        .strip_prefix(ASSETS_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(local)
        .to_string()
}
