use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static SOURCE_MAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(/\*#\s*sourceMappingURL=.*?\*/|//#\s*sourceMappingURL=.*)")
        .expect("Invalid source map regex")
});

/// Removes `sourceMappingURL` comments, block and line forms
///
/// Everything outside the comments is left untouched.
pub fn strip_source_maps(content: &str) -> Cow<'_, str> {
    SOURCE_MAP.replace_all(content, "")
}
