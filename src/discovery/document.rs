//! Document scanner
//!
//! # Reference Rules
//!
//! **Any resolvable http(s) reference:**
//! - `<link rel="stylesheet">`, `<link rel="preload">` (typed by `as`),
//!   `<link rel="modulepreload">`
//! - `<link rel="manifest">` and icon links
//! - `<script src>`
//!
//! **Absolute http(s) references only:**
//! - `<img src>`, `<img data-src>`, `srcset` candidates
//! - `<meta>` social images
//! - `background-image: url(...)` in `style` attributes
//!
//! `data:` URIs, empty values and fragment-only references never become jobs.

use crate::discovery::stylesheet::scan_stylesheet_fonts;
use crate::discovery::JobSet;
use crate::engine::{AssetKind, Job};
use crate::url::{canonicalize, is_absolute_http};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// `<meta>` names/properties whose content is an image URL
const META_IMAGES: &[&str] = &[
    "og:image",
    "og:image:secure_url",
    "twitter:image",
    "msapplication-TileImage",
];

static BACKGROUND_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"background-image:\s*url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#)
        .expect("Invalid background-image regex")
});

/// Everything found in one document
#[derive(Debug, Default)]
pub struct Discovery {
    /// Download jobs in discovery order
    pub jobs: Vec<Job>,
    /// Text of inline `<script>` elements
    pub inline_scripts: Vec<String>,
}

/// Scans a document for referenced assets
///
/// # Arguments
///
/// * `html` - The document text
/// * `base` - The document base URL
///
/// # Returns
///
/// The deduplicated job list. Fonts from inline `<style>` blocks are
/// deduplicated separately and follow the other jobs.
///
/// # Example
///
/// ```
/// use static_mirror::discovery::scan_document;
/// use url::Url;
///
/// let html = r#"<link rel="stylesheet" href="/a.css"><script src="/a.js"></script>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let discovery = scan_document(html, &base);
/// assert_eq!(discovery.jobs.len(), 2);
/// ```
pub fn scan_document(html: &str, base: &Url) -> Discovery {
    let document = Html::parse_document(html);
    let mut jobs = JobSet::new();

    scan_links(&document, base, &mut jobs);
    let inline_scripts = scan_scripts(&document, base, &mut jobs);
    scan_images(&document, base, &mut jobs);
    scan_meta(&document, base, &mut jobs);
    scan_style_attributes(&document, base, &mut jobs);

    let mut all = jobs.into_jobs();
    all.extend(scan_inline_styles(&document, base));

    tracing::debug!(
        "Discovered {} assets and {} inline scripts",
        all.len(),
        inline_scripts.len()
    );

    Discovery {
        jobs: all,
        inline_scripts,
    }
}

/// Adds an attribute reference, registering the `&amp;` spelling too
fn add_reference(jobs: &mut JobSet, base: &Url, kind: AssetKind, raw: &str) {
    let reference = raw.trim();
    let Some(url) = canonicalize(base, reference) else {
        tracing::trace!("Skipping unresolvable reference '{}'", reference);
        return;
    };

    jobs.add(url.clone(), kind, reference, base);
    if reference.contains('&') {
        jobs.add_origin(&url, &reference.replace('&', "&amp;"));
    }
}

fn add_absolute_reference(jobs: &mut JobSet, base: &Url, kind: AssetKind, raw: &str) {
    if is_absolute_http(raw) {
        add_reference(jobs, base, kind, raw);
    }
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn scan_links(document: &Html, base: &Url, jobs: &mut JobSet) {
    for element in select(document, "link[href]") {
        let href = element.value().attr("href").unwrap_or("");
        if href.trim().is_empty() {
            continue;
        }

        let rel = element.value().attr("rel").unwrap_or("").to_ascii_lowercase();
        let rels: Vec<&str> = rel.split_whitespace().collect();

        let kind = if rels.contains(&"stylesheet") {
            Some(AssetKind::Style)
        } else if rels.contains(&"preload") {
            preload_kind(element.value().attr("as"))
        } else if rels.contains(&"modulepreload") {
            Some(AssetKind::Script)
        } else if rels.iter().any(|r| {
            matches!(
                *r,
                "manifest" | "icon" | "apple-touch-icon" | "apple-touch-icon-precomposed" | "mask-icon"
            )
        }) {
            Some(AssetKind::Manifest)
        } else {
            None
        };

        if let Some(kind) = kind {
            add_reference(jobs, base, kind, href);
        }
    }
}

/// Kind of a `<link rel="preload">` from its `as` attribute
///
/// A missing `as` is treated as a stylesheet. Destinations with no local
/// counterpart (documents, media, workers) are skipped.
fn preload_kind(destination: Option<&str>) -> Option<AssetKind> {
    match destination.map(|d| d.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("style") => Some(AssetKind::Style),
        Some("script") => Some(AssetKind::Script),
        Some("font") => Some(AssetKind::Font),
        Some("image") => Some(AssetKind::Image),
        Some("fetch") => Some(AssetKind::Json),
        Some(_) => None,
    }
}

fn scan_scripts(document: &Html, base: &Url, jobs: &mut JobSet) -> Vec<String> {
    let mut inline = Vec::new();

    for element in select(document, "script") {
        match element.value().attr("src") {
            Some(src) if !src.trim().is_empty() => {
                add_reference(jobs, base, AssetKind::Script, src);
            }
            _ => {
                let text: String = element.text().collect();
                if !text.trim().is_empty() {
                    inline.push(text);
                }
            }
        }
    }

    inline
}

fn scan_images(document: &Html, base: &Url, jobs: &mut JobSet) {
    for element in select(document, "img") {
        for attr in ["src", "data-src"] {
            if let Some(value) = element.value().attr(attr) {
                add_absolute_reference(jobs, base, AssetKind::Image, value);
            }
        }
    }

    for element in select(document, "img[srcset], picture source[srcset]") {
        let srcset = element.value().attr("srcset").unwrap_or("");
        for candidate in parse_srcset(srcset) {
            add_absolute_reference(jobs, base, AssetKind::Image, candidate);
        }
    }
}

fn scan_meta(document: &Html, base: &Url, jobs: &mut JobSet) {
    for element in select(document, "meta[content]") {
        let key = element
            .value()
            .attr("property")
            .or_else(|| element.value().attr("name"))
            .unwrap_or("");

        if META_IMAGES.iter().any(|name| name.eq_ignore_ascii_case(key)) {
            let content = element.value().attr("content").unwrap_or("");
            add_absolute_reference(jobs, base, AssetKind::Image, content);
        }
    }
}

fn scan_style_attributes(document: &Html, base: &Url, jobs: &mut JobSet) {
    for element in select(document, "[style]") {
        let style = element.value().attr("style").unwrap_or("");
        for caps in BACKGROUND_IMAGE.captures_iter(style) {
            if let Some(m) = caps.get(1) {
                add_absolute_reference(jobs, base, AssetKind::Image, m.as_str());
            }
        }
    }
}

fn scan_inline_styles(document: &Html, base: &Url) -> Vec<Job> {
    let css: String = select(document, "style")
        .into_iter()
        .map(|element| element.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    scan_stylesheet_fonts(&css, base)
}

/// URLs of the candidates of a `srcset` attribute, in order
///
/// Each candidate is a URL followed by an optional width or density
/// descriptor; candidates are separated by commas. A URL may itself contain
/// commas, it only ends at whitespace or at a trailing comma.
pub fn parse_srcset(srcset: &str) -> Vec<&str> {
    let mut urls = Vec::new();
    let mut rest = srcset;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (candidate, after) = rest.split_at(end);
        let trimmed = candidate.trim_end_matches(',');
        if !trimmed.is_empty() {
            urls.push(trimmed);
        }

        rest = if candidate.ends_with(',') {
            after
        } else {
            // Skip the descriptor
            match after.find(',') {
                Some(i) => &after[i + 1..],
                None => "",
            }
        };
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post/").unwrap()
    }

    fn urls(discovery: &Discovery) -> Vec<&str> {
        discovery.jobs.iter().map(|j| j.url.as_str()).collect()
    }

    #[test]
    fn test_links_by_rel() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/css/main.css">
            <link rel="preload" href="/css/late.css">
            <link rel="preload" as="script" href="/js/pre.js">
            <link rel="preload" as="font" href="/f/a.woff2" crossorigin>
            <link rel="preload" as="fetch" href="/api/data.json">
            <link rel="preload" as="video" href="/media/v.mp4">
            <link rel="preload" href="">
            <link rel="modulepreload" href="/js/mod.js">
            <link rel="manifest" href="/site.webmanifest">
            <link rel="shortcut icon" href="/favicon.ico">
            <link rel="canonical" href="https://example.com/blog/post/">
        </head></html>"#;

        let discovery = scan_document(html, &base());
        let kinds: Vec<(&str, AssetKind)> = discovery
            .jobs
            .iter()
            .map(|j| (j.url.path(), j.kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("/css/main.css", AssetKind::Style),
                ("/css/late.css", AssetKind::Style),
                ("/js/pre.js", AssetKind::Script),
                ("/f/a.woff2", AssetKind::Font),
                ("/api/data.json", AssetKind::Json),
                ("/js/mod.js", AssetKind::Script),
                ("/site.webmanifest", AssetKind::Manifest),
                ("/favicon.ico", AssetKind::Manifest),
            ]
        );
    }

    #[test]
    fn test_scripts_external_and_inline() {
        let html = r#"<html><head>
            <script src="../app.js"></script>
            <script>window.config = {"a": 1};</script>
            <script></script>
        </head></html>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(urls(&discovery), vec!["https://example.com/blog/app.js"]);
        assert_eq!(discovery.jobs[0].origins, vec!["../app.js"]);
        assert_eq!(discovery.inline_scripts, vec![r#"window.config = {"a": 1};"#]);
    }

    #[test]
    fn test_images_absolute_only() {
        let html = r#"<body>
            <img src="https://cdn.example.com/a.jpg">
            <img src="relative.jpg" data-src="https://cdn.example.com/lazy.jpg">
            <img src="data:image/png;base64,AAAA">
            <img srcset="https://cdn.example.com/s.jpg 1x, local.jpg 2x, https://cdn.example.com/l.jpg 3x">
        </body>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(
            urls(&discovery),
            vec![
                "https://cdn.example.com/a.jpg",
                "https://cdn.example.com/lazy.jpg",
                "https://cdn.example.com/s.jpg",
                "https://cdn.example.com/l.jpg",
            ]
        );
        assert!(discovery.jobs.iter().all(|j| j.kind == AssetKind::Image));
    }

    #[test]
    fn test_meta_images() {
        let html = r#"<head>
            <meta property="og:image" content="https://cdn.example.com/og.png">
            <meta name="twitter:image" content="https://cdn.example.com/og.png">
            <meta name="msapplication-TileImage" content="/tile.png">
            <meta name="description" content="https://example.com/not-an-image">
        </head>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(urls(&discovery), vec!["https://cdn.example.com/og.png"]);
    }

    #[test]
    fn test_background_image_style_attribute() {
        let html = r#"<div style="color: red; background-image: url('https://cdn.example.com/bg.webp'); margin: 0"></div>
            <div style="background-image: url(/relative.png)"></div>
            <div style="background-image: url( &quot;https://cdn.example.com/padded.png&quot; )"></div>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(
            urls(&discovery),
            vec!["https://cdn.example.com/bg.webp", "https://cdn.example.com/padded.png"]
        );
    }

    #[test]
    fn test_inline_style_fonts_use_document_base() {
        let html = r#"<head><style>
            @font-face { src: url(fonts/a.woff2) format("woff2"); }
            body { background: url(img/bg.png); }
        </style></head>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(urls(&discovery), vec!["https://example.com/blog/post/fonts/a.woff2"]);
        assert_eq!(discovery.jobs[0].kind, AssetKind::Font);
    }

    #[test]
    fn test_duplicate_references_become_one_job() {
        let html = r#"<head>
            <link rel="stylesheet" href="/css/a.css">
            <link rel="stylesheet" href="https://example.com/css/a.css">
            <link rel="preload" as="style" href="../../css/a.css">
        </head>"#;

        let discovery = scan_document(html, &base());
        assert_eq!(discovery.jobs.len(), 1);
        assert_eq!(
            discovery.jobs[0].origins,
            vec!["/css/a.css", "https://example.com/css/a.css", "../../css/a.css"]
        );
    }

    #[test]
    fn test_ampersand_origin_variant() {
        let html = r#"<link rel="stylesheet" href="/css?family=Roboto&amp;display=swap">"#;

        let discovery = scan_document(html, &base());
        assert_eq!(
            discovery.jobs[0].origins,
            vec![
                "/css?family=Roboto&display=swap",
                "/css?family=Roboto&amp;display=swap"
            ]
        );
    }

    #[test]
    fn test_parse_srcset() {
        assert_eq!(parse_srcset("a.jpg 1x, b.jpg 2x"), vec!["a.jpg", "b.jpg"]);
        assert_eq!(parse_srcset("a.jpg"), vec!["a.jpg"]);
        assert_eq!(parse_srcset("a.jpg, b.jpg 2x,"), vec!["a.jpg", "b.jpg"]);
        assert_eq!(
            parse_srcset("https://x.com/w_100,h_50/a.jpg 100w, https://x.com/b.jpg 200w"),
            vec!["https://x.com/w_100,h_50/a.jpg", "https://x.com/b.jpg"]
        );
        assert!(parse_srcset("  ").is_empty());
    }
}
