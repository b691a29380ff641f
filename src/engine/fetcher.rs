//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a mirror run, including:
//! - Building the shared HTTP client with the configured user agent
//! - Fetching assets as raw bytes
//! - Fetching the root document as text
//! - Error classification into retryable asset errors

use crate::config::{ScraperConfig, UserAgentConfig};
use crate::engine::job::AssetError;
use crate::MirrorError;
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use url::Url;

/// Body and metadata of a successful response
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    /// Final URL after redirects
    pub final_url: Url,
    /// Content-Type header value
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedAsset {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds the HTTP client shared by all workers
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `scraper` - Timeout and pool size
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```
/// use static_mirror::config::Config;
/// use static_mirror::engine::build_http_client;
///
/// let config = Config::default();
/// let client = build_http_client(&config.user_agent, &config.scraper).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    scraper: &ScraperConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(scraper.request_timeout_secs);

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .pool_max_idle_per_host(scraper.workers as usize)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches an asset
///
/// Non-success statuses become [`AssetError::Status`]; transport failures
/// become [`AssetError::Network`], a failed body read [`AssetError::Body`].
/// All three are retryable.
pub async fn fetch_asset(client: &Client, url: &Url) -> Result<FetchedAsset, AssetError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| classify(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AssetError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.bytes().await.map_err(|e| AssetError::Body {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok(FetchedAsset {
        final_url,
        content_type,
        body: body.to_vec(),
    })
}

/// Fetches the root document
///
/// # Returns
///
/// * `Ok((String, Url))` - Document text and final URL after redirects
/// * `Err(MirrorError)` - Transport failure or non-success status
pub async fn fetch_document(client: &Client, url: &str) -> Result<(String, Url), MirrorError> {
    let parsed = Url::parse(url).map_err(|source| MirrorError::InvalidBaseUrl {
        url: url.to_string(),
        source,
    })?;

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|source| MirrorError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(MirrorError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().clone();
    let body = response.text().await.map_err(|source| MirrorError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok((body, final_url))
}

fn classify(url: &Url, error: &reqwest::Error) -> AssetError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection refused".to_string()
    } else {
        error.to_string()
    };

    AssetError::Network {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> (UserAgentConfig, ScraperConfig) {
        let user_agent = UserAgentConfig {
            name: "TestMirror".to_string(),
            version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        };
        (user_agent, ScraperConfig::default())
    }

    fn client() -> Client {
        let (user_agent, scraper) = create_test_config();
        build_http_client(&user_agent, &scraper).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        let (user_agent, scraper) = create_test_config();
        assert!(build_http_client(&user_agent, &scraper).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_asset_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.css"))
            .and(header("user-agent", "TestMirror/1.0 (+https://example.com/about)"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("body{}")
                    .insert_header("content-type", "text/css"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/a.css", server.uri())).unwrap();
        let asset = fetch_asset(&client(), &url).await.unwrap();

        assert_eq!(asset.text(), "body{}");
        assert_eq!(asset.content_type.as_deref(), Some("text/css"));
        assert_eq!(asset.final_url, url);
    }

    #[tokio::test]
    async fn test_fetch_asset_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();
        let err = fetch_asset(&client(), &url).await.unwrap_err();

        assert!(matches!(err, AssetError::Status { status: 404, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_asset_connection_refused() {
        // Nothing listens on port 1
        let url = Url::parse("http://127.0.0.1:1/a.css").unwrap();
        let err = fetch_asset(&client(), &url).await.unwrap_err();
        assert!(matches!(err, AssetError::Network { .. }));
    }

    #[tokio::test]
    async fn test_fetch_document_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/home/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/home/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let (body, final_url) = fetch_document(&client(), &format!("{}/", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<html></html>");
        assert_eq!(final_url.path(), "/home/");
    }

    #[tokio::test]
    async fn test_fetch_document_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = fetch_document(&client(), &server.uri()).await;
        assert!(matches!(result, Err(MirrorError::Status { status: 500, .. })));
    }
}
