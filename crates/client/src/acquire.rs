//! Fetch-with-fallback content acquisition.
//!
//! ### Policy
//! 1. Cache hit: return the cached bytes, reported as not browser-rendered.
//! 2. Take a limiter slot (waits without timeout, then sleeps the delay).
//! 3. Primary fetch. 200/201/202 is cached and returned.
//! 4. Anything else (needs-render status, unexpected status, transport
//!    fault) gets exactly one render attempt.
//!
//! Steps 2-4 run once per URL at a time: concurrent callers for a URL that
//! is not cached yet wait for the first caller's load and are reported like
//! a cache hit. Nothing escapes as an error: total failure is a
//! [`FetchResult`] with no content.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use url::Url;

use scrapewright_core::{AppConfig, Error};

use crate::fetch::{ContentCache, FetchClient, FetchConfig, PageFetcher, RequestLimiter, StatusClass, classify_status};
use crate::render::{RenderOptions, Renderer};

/// Outcome of [`ContentAcquirer::acquire`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    /// `None` when both fetch paths were exhausted.
    pub content: Option<Bytes>,
    pub rendered_by_browser: bool,
}

impl FetchResult {
    fn absent() -> Self {
        Self::default()
    }
}

/// Which paths a load may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    FetchThenRender,
    RenderOnly,
}

/// Composes the cache, the limiter, the primary fetcher and the optional
/// browser renderer.
pub struct ContentAcquirer {
    cache: ContentCache,
    limiter: RequestLimiter,
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn Renderer>>,
    render_options: RenderOptions,
}

impl ContentAcquirer {
    /// Build with default cache (100 entries, 1h) and limiter (10 slots, 1s).
    pub fn new(fetcher: Arc<dyn PageFetcher>, renderer: Option<Arc<dyn Renderer>>) -> Self {
        Self {
            cache: ContentCache::default(),
            limiter: RequestLimiter::default(),
            fetcher,
            renderer,
            render_options: RenderOptions::default(),
        }
    }

    /// Wire the reqwest fetcher and, when enabled and compiled in, the
    /// headless renderer.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = Arc::new(FetchClient::new(FetchConfig::from(config))?);

        Ok(Self::new(fetcher, default_renderer(config))
            .with_cache(ContentCache::new(config.cache_max_entries, config.cache_ttl()))
            .with_limiter(RequestLimiter::new(config.max_concurrent_requests, config.rate_limit_delay()))
            .with_render_options(RenderOptions::from(config)))
    }

    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_limiter(mut self, limiter: RequestLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    /// Fetch `url`, falling back to the browser when the primary fetch fails.
    pub async fn acquire(&self, url: &str) -> FetchResult {
        self.acquire_via(url, Route::FetchThenRender).await
    }

    /// Skip the primary fetch and go straight to the browser.
    ///
    /// Still cache-first, and still holds a limiter slot for the render.
    pub async fn acquire_rendered(&self, url: &str) -> FetchResult {
        self.acquire_via(url, Route::RenderOnly).await
    }

    async fn acquire_via(&self, url: &str, route: Route) -> FetchResult {
        let url = match parse_url(url) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("{e}");
                return FetchResult::absent();
            }
        };

        let loaded = AtomicBool::new(false);
        let rendered = AtomicBool::new(false);
        let content = self
            .cache
            .get_or_fetch(url.as_str(), async {
                loaded.store(true, Ordering::Relaxed);
                let _slot = match self.limiter.acquire().await {
                    Ok(slot) => slot,
                    Err(e) => {
                        tracing::error!("could not acquire fetch slot for {}: {e}", url);
                        return None;
                    }
                };

                if route == Route::FetchThenRender
                    && let Some(content) = self.fetch_primary(&url).await
                {
                    return Some(content);
                }

                let content = self.render(&url).await?;
                rendered.store(true, Ordering::Relaxed);
                Some(content)
            })
            .await;

        if content.is_some() && !loaded.load(Ordering::Relaxed) {
            tracing::debug!("cache hit for {}", url);
        }

        FetchResult { rendered_by_browser: content.is_some() && rendered.load(Ordering::Relaxed), content }
    }

    /// Primary fetch; `None` means the browser should try.
    async fn fetch_primary(&self, url: &Url) -> Option<Bytes> {
        match self.fetcher.fetch(url).await {
            Ok(response) => match classify_status(response.status) {
                StatusClass::Accepted => return Some(response.bytes),
                StatusClass::NeedsRender => {
                    tracing::info!("{} returned {}, retrying with browser", url, response.status);
                }
                StatusClass::Unexpected => {
                    tracing::warn!("{} returned unexpected {}, trying browser", url, response.status);
                }
            },
            Err(e) => {
                tracing::warn!("primary fetch of {} failed: {e}, trying browser", url);
            }
        }
        None
    }

    async fn render(&self, url: &Url) -> Option<Bytes> {
        let Some(renderer) = &self.renderer else {
            tracing::error!("no renderer available for {}, giving up", url);
            return None;
        };

        match renderer.render(url, &self.render_options).await {
            Ok(page) => {
                if page.timed_out {
                    tracing::warn!("using partial content for {} after navigation timeout", url);
                }
                Some(Bytes::from(page.html))
            }
            Err(e) => {
                tracing::error!("browser fallback for {} failed: {e}", url);
                None
            }
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{raw:?}: {e}")))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(Error::InvalidUrl(format!("unsupported scheme {} in {raw}", url.scheme())))
    }
}

#[cfg(feature = "render")]
fn default_renderer(config: &AppConfig) -> Option<Arc<dyn Renderer>> {
    config
        .render_enabled
        .then(|| Arc::new(crate::render::HeadlessRenderer::new()) as Arc<dyn Renderer>)
}

#[cfg(not(feature = "render"))]
fn default_renderer(config: &AppConfig) -> Option<Arc<dyn Renderer>> {
    if config.render_enabled {
        tracing::warn!("built without the render feature, browser fallback disabled");
    }
    None
}
