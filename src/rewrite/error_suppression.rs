use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Marker the injected script starts with; its presence disables injection
pub const SUPPRESSION_MARKER: &str = "static-mirror: offline error suppression";

const SUPPRESSION_SCRIPT: &str = r#"<script>
// static-mirror: offline error suppression
(function () {
    var patterns = ['Failed to fetch', 'NetworkError', 'ERR_CONNECTION_REFUSED',
        'localhost:127', 'SecurityError', 'Script origin does not match',
        "registering client's origin"];
    function offlineNoise(text) {
        text = String(text || '');
        for (var i = 0; i < patterns.length; i++) {
            if (text.indexOf(patterns[i]) !== -1) { return true; }
        }
        return false;
    }
    window.addEventListener('error', function (e) {
        if (offlineNoise(e.message)) { e.preventDefault(); e.stopPropagation(); }
    }, true);
    window.addEventListener('unhandledrejection', function (e) {
        if (offlineNoise(e.reason)) { e.preventDefault(); }
    });
    if (!window.__mirrorConsolePatched) {
        window.__mirrorConsolePatched = true;
        var consoleError = console.error;
        console.error = function () {
            var args = Array.prototype.slice.call(arguments);
            if (offlineNoise(args.join(' '))) { return; }
            consoleError.apply(console, args);
        };
    }
})();
</script>"#;

static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("Invalid head tag regex"));

/// Inserts the offline error-suppression script after the opening `<head>`
///
/// The script swallows failed-fetch, connection-refused and origin-mismatch
/// errors raised by the page's own code when it runs from local files.
/// Documents without a `<head>` tag and documents that already carry the
/// script are returned unchanged.
pub fn inject_error_suppression(document: &str) -> Cow<'_, str> {
    if document.contains(SUPPRESSION_MARKER) {
        return Cow::Borrowed(document);
    }

    match HEAD_OPEN.find(document) {
        Some(head) => {
            let mut out = String::with_capacity(document.len() + SUPPRESSION_SCRIPT.len() + 1);
            out.push_str(&document[..head.end()]);
            out.push('\n');
            out.push_str(SUPPRESSION_SCRIPT);
            out.push_str(&document[head.end()..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(document),
    }
}
