//! Primary HTTP fetch path.
//!
//! ### Request shape
//! - Browser-like header set (User-Agent plus [`BROWSER_HEADERS`])
//! - Redirects followed (max 10)
//! - 30s timeout by default
//! - Bodies over [`FetchConfig::max_bytes`] are abandoned mid-stream
//!
//! ### Status handling
//! - The fetcher never rejects a response by status; it reports it.
//! - [`classify_status`] decides what the acquirer does with it.
//!
//! The concurrency cap and inter-request delay live in [`limiter`]; the
//! time-bounded content cache lives in [`cache`].

pub mod cache;
pub mod limiter;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};
use url::Url;

pub use cache::ContentCache;
pub use limiter::{FetchSlot, RequestLimiter};

use scrapewright_core::{AppConfig, Error, config::DEFAULT_USER_AGENT};

/// Headers sent alongside the User-Agent by both fetch paths.
///
/// Accept-Encoding is left to the HTTP client so decompression stays automatic.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Cache-Control", "no-cache"),
    ("Pragma", "no-cache"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
];

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: desktop Chrome)
    pub user_agent: String,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
            max_redirects: 10,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_bytes: config.max_body_bytes,
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// What the acquirer should do with a primary response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 200, 201 or 202: use the body as is.
    Accepted,
    /// 401, 403, 503 or any 5xx: the page likely needs a real browser.
    NeedsRender,
    /// Anything else: try the browser as a last resort.
    Unexpected,
}

/// Classify a primary fetch status.
pub fn classify_status(status: StatusCode) -> StatusClass {
    match status.as_u16() {
        200..=202 => StatusClass::Accepted,
        401 | 403 | 503 => StatusClass::NeedsRender,
        code if code >= 500 => StatusClass::NeedsRender,
        _ => StatusClass::Unexpected,
    }
}

/// Append `chunk` to `body`, refusing to grow past `max_bytes`.
fn append_capped(body: &mut BytesMut, chunk: &[u8], max_bytes: usize) -> Result<(), Error> {
    if body.len() + chunk.len() > max_bytes {
        return Err(Error::FetchTooLarge(format!("body exceeds {} bytes", max_bytes)));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

/// Direct page fetch, the first tier of content acquisition.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`. Any HTTP status is a successful fetch; only transport
    /// failures are errors.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error>;
}

/// reqwest-backed [`PageFetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in BROWSER_HEADERS {
            let header_name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::HttpError(format!("invalid header {}: {}", name, e)))?;
            headers.insert(header_name, header::HeaderValue::from_static(value));
        }

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut response = self.http.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{} after {:?}", url, self.config.timeout))
            } else {
                Error::HttpError(format!("network error: {}", e))
            }
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(len) = response.content_length()
            && len > self.config.max_bytes as u64
        {
            return Err(Error::FetchTooLarge(format!("{}: {} bytes exceeds {}", url, len, self.config.max_bytes)));
        }

        let mut body = BytesMut::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{} while reading body", url))
                } else {
                    Error::HttpError(format!("failed to read response: {}", e))
                }
            })?;
            let Some(chunk) = chunk else { break };
            append_capped(&mut body, &chunk, self.config.max_bytes)?;
        }
        let bytes = body.freeze();

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} [{}] in {}ms ({} bytes)",
            url,
            final_url,
            status.as_u16(),
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { final_url, status, content_type, bytes, fetch_ms })
    }
}
