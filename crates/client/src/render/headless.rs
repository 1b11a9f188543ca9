//! chromiumoxide-backed renderer: one fresh headless browser per call.

use std::time::{Duration, Instant};

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use url::Url;

use super::{RenderError, RenderOptions, RenderedPage, Renderer, SCROLL_SCRIPT, STEALTH_SCRIPT};
use crate::fetch::BROWSER_HEADERS;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Headless Chrome/Chromium renderer using chromiumoxide.
///
/// Holds no browser between calls: every [`Renderer::render`] launches its
/// own instance and closes it before returning, whatever the outcome.
#[derive(Debug, Default, Clone)]
pub struct HeadlessRenderer;

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self
    }

    async fn launch(opts: &RenderOptions) -> Result<(Browser, JoinHandle<()>), RenderError> {
        let config = BrowserConfig::builder()
            .window_size(opts.viewport.0, opts.viewport.1)
            .no_sandbox()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .request_timeout(opts.timeout)
            .build()
            .map_err(RenderError::BrowserLaunch)?;

        let (browser, mut handler) = tokio::time::timeout(opts.timeout, Browser::launch(config))
            .await
            .map_err(|_| RenderError::Timeout(opts.timeout.as_millis() as u64))?
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                }
            }
        });

        Ok((browser, events))
    }

    async fn drive(browser: &Browser, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let start = Instant::now();
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        Self::disguise(&page, opts).await?;

        let timed_out = match tokio::time::timeout(opts.timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {
                Self::settle(&page, opts).await;
                false
            }
            Ok(Err(e)) => return Err(RenderError::Navigation(e.to_string())),
            Err(_) => {
                tracing::warn!("navigation to {} timed out after {:?}, keeping partial content", url, opts.timeout);
                true
            }
        };

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        page.close().await.ok();

        Ok(RenderedPage { html, final_url, render_time_ms: start.elapsed().as_millis() as u64, timed_out })
    }

    /// Mask automation markers and match the primary fetcher's headers.
    async fn disguise(page: &Page, opts: &RenderOptions) -> Result<(), RenderError> {
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| RenderError::Navigation(format!("stealth script: {e}")))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(opts.user_agent.clone()))
            .await
            .map_err(|e| RenderError::Navigation(format!("user agent: {e}")))?;

        let headers: serde_json::Map<String, serde_json::Value> = BROWSER_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), serde_json::Value::from(*value)))
            .collect();

        page.execute(SetExtraHttpHeadersParams::new(Headers::new(serde_json::Value::Object(headers))))
            .await
            .map_err(|e| RenderError::Navigation(format!("extra headers: {e}")))?;

        Ok(())
    }

    /// Post-load waits. Each step is best effort and bounded.
    async fn settle(page: &Page, opts: &RenderOptions) {
        let loaded = tokio::time::timeout(opts.secondary_wait, async {
            loop {
                let state = page
                    .evaluate("document.readyState")
                    .await
                    .ok()
                    .and_then(|r| r.into_value::<String>().ok());
                if state.as_deref() == Some("complete") {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await;
        if loaded.is_err() {
            tracing::debug!("page never reported readyState=complete");
        }

        tokio::time::sleep(opts.settle).await;

        if let Err(e) = page.evaluate(SCROLL_SCRIPT).await {
            tracing::debug!("scroll failed: {e}");
        }
        tokio::time::sleep(opts.scroll_pause).await;

        if let Some(selector) = &opts.wait_for {
            let found = tokio::time::timeout(opts.secondary_wait, async {
                while page.find_element(selector.as_str()).await.is_err() {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            })
            .await;
            if found.is_err() {
                tracing::debug!("ready marker {selector} not found, continuing");
            }
        }
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url, opts: &RenderOptions) -> Result<RenderedPage, RenderError> {
        let (mut browser, events) = Self::launch(opts).await?;

        let result = Self::drive(&browser, url, opts).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {e}");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!("browser wait failed: {e}");
        }
        events.abort();

        let page = result?;
        if page.is_suspiciously_short() {
            tracing::warn!(
                "rendered {} is only {} characters; the page may be blocking automation",
                url,
                page.html.chars().count()
            );
        }
        tracing::debug!("rendered {} in {}ms", page.final_url, page.render_time_ms);
        Ok(page)
    }
}
