//! Integration tests for the mirror
//!
//! These tests use wiremock to serve a page and its assets and run the full
//! discover, download, rewrite cycle end-to-end.

use static_mirror::config::Config;
use static_mirror::engine::{localize_document, NoProgress, ProgressSink};
use static_mirror::{
    AssetKind, FsStorage, MemoryStorage, Mirror, MirrorError, MirrorOutput, StorageSink,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short retry delays
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.scraper.workers = 4;
    config.scraper.max_attempts = 3;
    config.scraper.retry_base_delay_ms = 10; // Very short for testing
    config.scraper.request_timeout_secs = 5;
    config.scraper.progress_interval_ms = 50;
    config
}

async fn mount(server: &MockServer, route: &str, body: &str, content_type: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", content_type),
        )
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, route: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(404))
        .expect(times)
        .mount(server)
        .await;
}

/// Serves `html` as the root page and mirrors it into `storage`
async fn mirror_page(
    server: &MockServer,
    html: &str,
    storage: Arc<dyn StorageSink>,
) -> MirrorOutput {
    mount(server, "/", html, "text/html", 1).await;

    let mirror = Mirror::new(&create_test_config())
        .expect("Failed to build mirror")
        .with_progress(Arc::new(NoProgress));

    let (document, base) = mirror
        .fetch_document(&format!("{}/", server.uri()))
        .await
        .expect("Failed to fetch root document");

    mirror
        .localize(&document, &base, storage)
        .await
        .expect("Failed to localize document")
}

#[tokio::test]
async fn test_stylesheet_and_fonts_localized() {
    let server = MockServer::start().await;

    let css = r#"@font-face { font-family: Icons; src: url("../webfonts/a.woff2") format("woff2"); }
body { background: url(../img/bg.png); }"#;
    mount(&server, "/css/style.css", css, "text/css", 1).await;
    mount(&server, "/webfonts/a.woff2", "wOF2", "font/woff2", 1).await;

    let html = r#"<html><head><link rel="stylesheet" href="/css/style.css"></head><body></body></html>"#;
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, html, storage.clone()).await;

    assert!(output.document.contains(r#"href="assets/style.css""#));
    assert_eq!(output.summary.successful, 2);
    assert_eq!(output.summary.failed, 0);

    let stored = storage.get_text("assets/style.css").expect("stylesheet stored");
    assert!(stored.contains(r#"url("fonts/a.woff2")"#));
    assert!(stored.contains("url(../img/bg.png)"));
    assert_eq!(storage.get_text("assets/fonts/a.woff2").as_deref(), Some("wOF2"));
}

#[tokio::test]
async fn test_templated_script_stylesheet() {
    let server = MockServer::start().await;
    let escaped = server.uri().replace('/', "\\/");

    let js = format!(
        r#"var cfg = {{"css_file":"{}\/banner-{{banner_id}}-{{type}}.css","user_banner_id":"7","consenttype":"optin"}};"#,
        escaped
    );
    mount(&server, "/app.js", &js, "application/javascript", 1).await;
    mount(&server, "/banner-7-optin.css", ".banner { color: red; }", "text/css", 1).await;

    let html = r#"<html><head><script src="/app.js"></script></head></html>"#;
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, html, storage.clone()).await;

    assert!(output.document.contains(r#"src="assets/app.js""#));
    assert_eq!(output.summary.successful, 2);

    let script = storage.get_text("assets/app.js").expect("script stored");
    assert!(script.contains(r#""css_file":"assets/banner-7-optin.css""#));
    assert!(storage.get("assets/banner-7-optin.css").is_some());
}

#[tokio::test]
async fn test_inline_script_stylesheet_literal() {
    let server = MockServer::start().await;
    let escaped = server.uri().replace('/', "\\/");
    mount(&server, "/consent.css", ".consent {}", "text/css", 1).await;

    let html = format!(
        r#"<html><head><script>window.cfg = {{"css":"{}\/consent.css"}};</script></head></html>"#,
        escaped
    );
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, &html, storage.clone()).await;

    assert!(output.document.contains(r#"{"css":"assets/consent.css"}"#));
    assert!(storage.get("assets/consent.css").is_some());
}

#[tokio::test]
async fn test_srcset_partial_success() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_missing(&server, "/a.jpg", 3).await;
    mount(&server, "/b.jpg", "jpeg", "image/jpeg", 1).await;

    let html = format!(
        r#"<html><body><img src="{uri}/b.jpg" srcset="{uri}/a.jpg 1x, {uri}/b.jpg 2x"></body></html>"#,
        uri = uri
    );
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, &html, storage.clone()).await;

    assert_eq!(
        output.document,
        format!(
            r#"<html><body><img src="assets/images/b.jpg" srcset="{}/a.jpg 1x, assets/images/b.jpg 2x"></body></html>"#,
            uri
        )
    );

    assert_eq!(output.summary.successful, 1);
    assert_eq!(output.summary.failed, 1);
    let failure = &output.summary.failures[0];
    assert_eq!(failure.kind, AssetKind::Image);
    assert_eq!(failure.attempts, 3);
}

#[tokio::test]
async fn test_duplicate_origins_fetched_once() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount(&server, "/style.css", "body {}", "text/css", 1).await;

    let html = format!(
        r#"<link rel="preload" as="style" href="{}/style.css"><link rel="stylesheet" href="/style.css">"#,
        uri
    );
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, &html, storage.clone()).await;

    assert_eq!(
        output.document,
        r#"<link rel="preload" as="style" href="assets/style.css"><link rel="stylesheet" href="assets/style.css">"#
    );
    assert_eq!(output.asset_map.len(), 2);
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn test_missing_font_is_not_critical() {
    let server = MockServer::start().await;

    mount(&server, "/style.css", "@font-face { src: url(gone.woff); }", "text/css", 1).await;
    mount_missing(&server, "/gone.woff", 3).await;

    let html = r#"<link rel="stylesheet" href="/style.css">"#;
    let storage = Arc::new(MemoryStorage::new());
    let output = mirror_page(&server, html, storage.clone()).await;

    assert_eq!(output.summary.successful, 1);
    assert_eq!(output.summary.failed, 1);
    assert_eq!(output.summary.critical_failures().count(), 0);
    assert!(output.document.contains("assets/style.css"));
}

#[tokio::test]
async fn test_filesystem_mirror() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount(&server, "/style.css", "h1 { color: blue; }", "text/css", 1).await;
    mount(&server, "/logo.png", "png", "image/png", 1).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path().join("mirror");
    let storage = Arc::new(FsStorage::prepare(&root, "index.html", true).expect("Failed to prepare storage"));

    let html = format!(
        r#"<link rel="stylesheet" href="style.css"><img src="{}/logo.png">"#,
        uri
    );
    let output = mirror_page(&server, &html, storage.clone()).await;

    assert_eq!(
        output.document,
        r#"<link rel="stylesheet" href="assets/style.css"><img src="assets/images/logo.png">"#
    );
    assert_eq!(
        std::fs::read_to_string(root.join("assets/style.css")).unwrap(),
        "h1 { color: blue; }"
    );
    assert!(root.join("assets/images/logo.png").exists());
    assert!(root.join("assets/fonts").is_dir());
}

#[tokio::test]
async fn test_script_cycle_terminates() {
    let server = MockServer::start().await;
    let escaped = server.uri().replace('/', "\\/");

    // Two scripts served from .css paths that name each other and themselves
    let a = format!(r#"var next = "{0}\/b.css", me = "{0}\/a.css";"#, escaped);
    let b = format!(r#"var next = "{0}\/a.css", me = "{0}\/b.css";"#, escaped);
    mount(&server, "/a.css", &a, "application/javascript", 1).await;
    mount(&server, "/b.css", &b, "application/javascript", 1).await;

    let html = r#"<script src="/a.css"></script><script src="/b.css"></script>"#;
    let storage = Arc::new(MemoryStorage::new());
    let output = tokio::time::timeout(
        Duration::from_secs(10),
        mirror_page(&server, html, storage.clone()),
    )
    .await
    .expect("mirror must terminate");

    assert_eq!(output.summary.successful, 2);
    assert_eq!(output.summary.failed, 0);
    assert_eq!(
        output.document,
        r#"<script src="assets/a.css.js"></script><script src="assets/b.css.js"></script>"#
    );
}

#[tokio::test]
async fn test_localize_document_entry_point() {
    let server = MockServer::start().await;
    mount(&server, "/a.css", "a {}", "text/css", 1).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let progress: Arc<dyn ProgressSink> = {
        let seen = seen.clone();
        Arc::new(move |completed: usize, total: usize| {
            seen.lock().unwrap().push((completed, total));
        })
    };

    let storage = Arc::new(MemoryStorage::new());
    let output = localize_document(
        r#"<link rel="stylesheet" href="a.css">"#,
        &format!("{}/", server.uri()),
        0, // Clamped to one worker
        storage.clone(),
        progress,
    )
    .await
    .expect("Failed to localize document");

    assert_eq!(output.document, r#"<link rel="stylesheet" href="assets/a.css">"#);
    assert_eq!(storage.get_text("assets/a.css").as_deref(), Some("a {}"));
    assert_eq!(seen.lock().unwrap().last().copied(), Some((1, 1)));
}

#[tokio::test]
async fn test_localize_document_clamps_large_pool() {
    let server = MockServer::start().await;
    mount(&server, "/a.js", "1", "application/javascript", 1).await;

    let output = localize_document(
        r#"<script src="/a.js"></script>"#,
        &server.uri(),
        10_000,
        Arc::new(MemoryStorage::new()),
        Arc::new(NoProgress),
    )
    .await
    .expect("Failed to localize document");

    assert_eq!(output.document, r#"<script src="assets/a.js"></script>"#);
}

#[tokio::test]
async fn test_localize_document_rejects_invalid_base() {
    let result = localize_document(
        r#"<link rel="stylesheet" href="a.css">"#,
        "not a url",
        4,
        Arc::new(MemoryStorage::new()),
        Arc::new(NoProgress),
    )
    .await;

    assert!(matches!(result, Err(MirrorError::InvalidBaseUrl { .. })));
}

#[tokio::test]
async fn test_invalid_configuration_rejected() {
    let mut config = create_test_config();
    config.scraper.workers = 0;

    assert!(matches!(Mirror::new(&config), Err(MirrorError::Config(_))));
}
