//! Headless browser rendering, the fallback tier of content acquisition.
//!
//! The [`Renderer`] trait is always available so the acquirer can be wired
//! with any implementation; the chromiumoxide-backed [`HeadlessRenderer`] is
//! gated behind the `render` feature.

#[cfg(feature = "render")]
mod headless;

#[cfg(feature = "render")]
pub use headless::HeadlessRenderer;

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Rendered pages shorter than this are logged as suspicious.
pub const MIN_CONTENT_CHARS: usize = 1000;

/// JavaScript installed on every new document to mask automation markers.
pub const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
  window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);
}
"#;

/// Scrolls to the bottom once to trigger lazy-loaded content.
pub const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body ? document.body.scrollHeight : 0);";

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to set up or navigate the page.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Timeout waiting for page to load.
    #[error("render timeout after {0}ms")]
    Timeout(u64),
}

/// Options for rendering a page.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// User agent announced by the browser.
    pub user_agent: String,

    /// Navigation timeout (default: 30s).
    pub timeout: Duration,

    /// Bound for each secondary wait: load state, ready marker (default: 5s).
    pub secondary_wait: Duration,

    /// Quiet period after load for late network activity (default: 2s).
    pub settle: Duration,

    /// Pause after the synthetic scroll (default: 1s).
    pub scroll_pause: Duration,

    /// Optional CSS selector waited for on a best-effort basis.
    pub wait_for: Option<String>,

    /// Viewport dimensions (default: 1920x1080).
    pub viewport: (u32, u32),
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            user_agent: scrapewright_core::config::DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            secondary_wait: Duration::from_secs(5),
            settle: Duration::from_secs(2),
            scroll_pause: Duration::from_secs(1),
            wait_for: None,
            viewport: (1920, 1080),
        }
    }
}

impl From<&scrapewright_core::AppConfig> for RenderOptions {
    fn from(config: &scrapewright_core::AppConfig) -> Self {
        let wait_for = Some(config.render_ready_selector.clone()).filter(|s| !s.trim().is_empty());
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), wait_for, ..Default::default() }
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Rendered HTML content.
    pub html: String,

    /// Final URL after redirects.
    pub final_url: Url,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,

    /// Navigation hit the timeout and `html` is whatever had loaded by then.
    pub timed_out: bool,
}

impl RenderedPage {
    /// Whether the page is too short to be the real content.
    pub fn is_suspiciously_short(&self) -> bool {
        self.html.chars().count() < MIN_CONTENT_CHARS
    }
}

/// Renderer trait for headless browser page rendering.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL to HTML via headless browser.
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError>;
}
