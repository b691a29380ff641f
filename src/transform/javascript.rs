//! Stylesheet references embedded in JavaScript
//!
//! Two shapes are recognized inside double-quoted string literals:
//! - templated URLs such as `"https:\/\/cdn\/banner-{banner_id}-{type}.css"`,
//!   whose placeholders are filled from JSON-like pairs in the same script
//! - absolute URLs such as `"https:\/\/cdn\/consent.css"`
//!
//! Only stylesheet targets are fetched. Escaped separators (`\/`) are kept in
//! the literal and unescaped for resolution.

use crate::url::canonicalize;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use url::Url;

static TEMPLATE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]*\\?/[^"]*\{[^}]+\}[^"]*\.(?:css|js)(?:\?[^"]*)?)""#)
        .expect("Invalid template URL regex")
});

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("Invalid placeholder regex"));

static DIRECT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(https?:\\?/\\?/[^"]*\.(?:css|js|png|jpg|jpeg|gif|webp|svg)(?:\?[^"]*)?)""#,
    )
    .expect("Invalid direct URL regex")
});

static CONSENT_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""consenttype":\s*"([^"]+)""#).expect("Invalid consenttype regex"));

/// A stylesheet URL found in a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    /// The literal as written between the quotes
    pub literal: String,
    /// Resolved stylesheet URL
    pub url: Url,
}

/// Finds the stylesheet literals of a script
///
/// # Arguments
///
/// * `js` - Script text
/// * `base` - Document base URL
///
/// # Returns
///
/// One entry per distinct literal, templated literals first. A templated
/// literal is only returned when every placeholder could be filled.
pub fn find_stylesheet_references(js: &str, base: &Url) -> Vec<ScriptReference> {
    let mut references = Vec::new();
    let mut seen = HashSet::new();

    for caps in TEMPLATE_URL.captures_iter(js) {
        let Some(literal) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if seen.contains(literal) {
            continue;
        }

        let Some(resolved) = fill_placeholders(&unescape(literal), js) else {
            tracing::debug!("Unresolved placeholders in script URL {}", literal);
            continue;
        };
        if let Some(url) = stylesheet_url(base, &resolved) {
            seen.insert(literal);
            references.push(ScriptReference {
                literal: literal.to_string(),
                url,
            });
        }
    }

    for caps in DIRECT_URL.captures_iter(js) {
        let Some(literal) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if literal.contains('{') || seen.contains(literal) {
            continue;
        }

        if let Some(url) = stylesheet_url(base, &unescape(literal)) {
            seen.insert(literal);
            references.push(ScriptReference {
                literal: literal.to_string(),
                url,
            });
        }
    }

    references
}

/// Substitutes every `{name}` placeholder with its value from `js`
///
/// # Returns
///
/// `None` if any placeholder has no value
pub fn fill_placeholders(template: &str, js: &str) -> Option<String> {
    let mut values: HashMap<&str, String> = HashMap::new();

    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps.get(1)?.as_str();
        if values.contains_key(name) {
            continue;
        }
        values.insert(name, placeholder_value(name, js)?);
    }

    let filled = PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        values
            .get(&caps[1])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });

    if filled.contains('{') || filled.contains('}') {
        None
    } else {
        Some(filled.into_owned())
    }
}

/// Looks up the value of a placeholder
///
/// `type` is read from `"consenttype"`. Other names are tried as
/// `"name":"value"`, `"user_name":"value"`, `"name":123` and
/// `"user_name":123`, in that order.
fn placeholder_value(name: &str, js: &str) -> Option<String> {
    if name == "type" {
        return CONSENT_TYPE
            .captures(js)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
    }

    let escaped = regex::escape(name);
    let patterns = [
        format!(r#""{}":\s*"([^"]+)""#, escaped),
        format!(r#""user_{}":\s*"([^"]+)""#, escaped),
        format!(r#""{}":\s*(\d+)"#, escaped),
        format!(r#""user_{}":\s*(\d+)"#, escaped),
    ];

    patterns.iter().find_map(|pattern| {
        Regex::new(pattern)
            .ok()?
            .captures(js)?
            .get(1)
            .map(|m| m.as_str().to_string())
    })
}

fn unescape(literal: &str) -> String {
    literal.replace("\\/", "/")
}

fn stylesheet_url(base: &Url, reference: &str) -> Option<Url> {
    let url = canonicalize(base, reference)?;
    if url.path().to_ascii_lowercase().ends_with(".css") {
        Some(url)
    } else {
        None
    }
}

/// Replaces the quoted literals with their local paths
pub fn localize_script(js: &str, replacements: &HashMap<String, String>) -> String {
    let mut out = js.to_string();
    for (literal, local) in replacements {
        out = out.replace(&format!("\"{}\"", literal), &format!("\"{}\"", local));
    }
    out
}
