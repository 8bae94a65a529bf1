use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use pricewatch_core::error::AppError;
use pricewatch_core::models::{BrowserOptions, SiteConfig};

/// Headless-browser renderer using Chromium via the Chrome DevTools Protocol.
///
/// Unlike [`super::SiteFetcher`], this renders JavaScript before returning
/// the HTML, making it suitable for marketplaces that hide their listings
/// behind client-side rendering or bot checks.
///
/// Each [`render`](Self::render) call launches a fresh Chromium process,
/// navigates, waits for the site's result selector, and shuts the browser
/// down again on every path. Sessions are never shared between sites, so a
/// crashed or bot-flagged session cannot poison a later job.
#[derive(Clone)]
pub struct BrowserClient {
    screenshot_dir: PathBuf,
}

impl BrowserClient {
    pub fn new() -> Self {
        Self {
            screenshot_dir: std::env::temp_dir(),
        }
    }

    /// Store error screenshots under `dir` instead of the temp directory.
    pub fn with_screenshot_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            screenshot_dir: dir.into(),
        }
    }

    /// Render one page and return its HTML.
    ///
    /// A missing wait selector is not an error: after the page-load timeout
    /// the partial DOM is returned and the engine extracts what it can.
    pub async fn render(&self, site: &SiteConfig, url: &str) -> Result<String, AppError> {
        let opts = &site.browser;
        let config = build_config(opts)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let result = self.render_on(&browser, site, url).await;

        // The session is torn down on success and failure alike.
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }

    async fn render_on(
        &self,
        browser: &Browser,
        site: &SiteConfig,
        url: &str,
    ) -> Result<String, AppError> {
        let opts = &site.browser;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open page: {e}")))?;

        // Headless Chromium advertises itself through navigator.webdriver;
        // sites that check it serve an empty shell instead of listings.
        page.evaluate_on_new_document(
            "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });",
        )
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to install stealth script: {e}")))?;

        let navigated = page.goto(url).await;
        if let Err(e) = navigated {
            self.capture_failure(&page, site).await;
            let _ = page.close().await;
            return Err(AppError::BrowserError(format!(
                "Failed to navigate to {url}: {e}"
            )));
        }

        self.wait_for_results(&page, opts).await;

        let html = page.content().await;
        if html.is_err() {
            self.capture_failure(&page, site).await;
        }
        let _ = page.close().await;

        html.map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))
    }

    /// Poll for the wait selector until it appears or the page-load timeout
    /// elapses. Timing out only logs — the partial DOM is still usable.
    async fn wait_for_results(&self, page: &Page, opts: &BrowserOptions) {
        let deadline = Duration::from_secs(opts.page_load_timeout);
        let found = tokio::time::timeout(deadline, async {
            while page.find_element(opts.wait_selector.as_str()).await.is_err() {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        })
        .await;

        if found.is_err() {
            tracing::warn!(
                selector = %opts.wait_selector,
                timeout_secs = opts.page_load_timeout,
                "Wait selector never appeared; extracting from partial DOM"
            );
        }
    }

    async fn capture_failure(&self, page: &Page, site: &SiteConfig) {
        if !site.browser.screenshot_on_error {
            return;
        }
        let slug: String = site
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let path = self
            .screenshot_dir
            .join(format!("pricewatch-{slug}-{}.png", unix_timestamp()));
        match page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), &path)
            .await
        {
            Ok(_) => tracing::info!(path = %path.display(), "Saved error screenshot"),
            Err(e) => tracing::warn!(error = %e, "Failed to save error screenshot"),
        }
    }
}

impl Default for BrowserClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config(opts: &BrowserOptions) -> Result<BrowserConfig, AppError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--window-size=1920,1080")
        .arg("--no-first-run");

    if !opts.headless {
        builder = builder.with_head();
    }
    if opts.disable_images {
        builder = builder.arg("--blink-settings=imagesEnabled=false");
    }

    builder
        .build()
        .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
