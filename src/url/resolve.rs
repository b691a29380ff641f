use url::Url;

/// Resolves a reference against an absolute base URL
///
/// Handles absolute URLs, protocol-relative references (`//host/path`, which
/// inherit the base scheme) and relative paths. A reference that cannot be
/// resolved is returned unchanged, so a malformed attribute never aborts a
/// scrape.
///
/// # Examples
///
/// ```
/// use static_mirror::url::resolve_reference;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/blog/post").unwrap();
/// assert_eq!(resolve_reference(&base, "../css/a.css"), "https://example.com/css/a.css");
/// assert_eq!(resolve_reference(&base, "//cdn.example.com/x.js"), "https://cdn.example.com/x.js");
/// ```
pub fn resolve_reference(base: &Url, reference: &str) -> String {
    match base.join(reference) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => reference.to_string(),
    }
}

/// Resolves a reference to the canonical URL used as the job identity
///
/// Returns `None` for references that can never become a fetch:
/// - empty or whitespace-only values
/// - fragment-only references (`#top`)
/// - non-HTTP(S) results (`data:`, `javascript:`, `mailto:` ...)
/// - references that fail to resolve
///
/// The fragment is never sent to the server, so it is dropped, and so is an
/// empty query: `font.eot?#iefix` and `font.eot` are the same file.
pub fn canonicalize(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let mut url = Url::parse(&resolve_reference(base, reference)).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }
    Some(url)
}

/// Returns true if the reference is an absolute `http://` or `https://` URL
pub fn is_absolute_http(reference: &str) -> bool {
    let bytes = reference.trim_start().as_bytes();
    let has_prefix = |prefix: &[u8]| {
        bytes
            .get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false)
    };
    has_prefix(b"http://") || has_prefix(b"https://")
}

/// Returns the final path segment of a URL (empty for directory URLs)
pub fn last_segment(url: &Url) -> &str {
    url.path().rsplit('/').next().unwrap_or("")
}

/// Returns the lowercase extension of the final path segment
///
/// Query strings and fragments are not part of the path, so
/// `font.eot?#iefix` yields `eot`.
pub fn path_extension(url: &Url) -> Option<String> {
    let segment = last_segment(url);
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
