//! Fetch-strategy selection: direct HTTP first, browser when needed.

use pricewatch_core::error::AppError;
use pricewatch_core::models::{ProductRecord, SiteConfig};
use pricewatch_core::traits::{Fetcher, SearchEngine};

#[cfg(feature = "browser")]
use crate::browser::BrowserClient;
use crate::protection::looks_protected;

use super::extract_records;

/// Search engine that picks the fetch strategy per site.
///
/// Sites flagged `use_browser` always render through the browser. Everyone
/// else gets a direct fetch, escalated to the browser at most once per
/// term when the site allows it and the direct response failed or looks
/// bot-protected. A browser failure after fallback is final for the term.
#[derive(Clone)]
pub struct HybridEngine<F: Fetcher> {
    fetcher: F,
    #[cfg(feature = "browser")]
    browser: BrowserClient,
}

impl<F: Fetcher> HybridEngine<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            #[cfg(feature = "browser")]
            browser: BrowserClient::new(),
        }
    }

    #[cfg(feature = "browser")]
    pub fn with_browser(fetcher: F, browser: BrowserClient) -> Self {
        Self { fetcher, browser }
    }

    #[cfg(feature = "browser")]
    async fn render(&self, site: &SiteConfig, url: &str) -> Result<String, AppError> {
        self.browser.render(site, url).await
    }

    #[cfg(not(feature = "browser"))]
    async fn render(&self, site: &SiteConfig, _url: &str) -> Result<String, AppError> {
        Err(AppError::ConfigError(format!(
            "Site '{}' requires browser rendering but the 'browser' feature is not enabled",
            site.name
        )))
    }
}

impl<F: Fetcher> SearchEngine for HybridEngine<F> {
    async fn search(
        &self,
        site: &SiteConfig,
        term: &str,
        max_results: usize,
    ) -> Result<Vec<ProductRecord>, AppError> {
        let url = site.search_url(term)?;

        if site.use_browser {
            let html = self.render(site, &url).await?;
            return extract_records(site, &html, max_results);
        }

        let html = match self.fetcher.fetch(site, &url).await {
            Ok(html) if !looks_protected(&html) => html,
            Ok(_) if site.fallback_to_browser => {
                tracing::info!(site = %site.name, %term, "Bot protection detected, falling back to browser");
                self.render(site, &url).await?
            }
            Ok(_) => {
                return Err(AppError::HttpError(format!(
                    "Bot protection detected on '{}'",
                    site.name
                )));
            }
            Err(e) if site.fallback_to_browser && !e.is_config_fatal() => {
                tracing::warn!(site = %site.name, %term, error = %e, "Direct fetch failed, falling back to browser");
                self.render(site, &url).await?
            }
            Err(e) => return Err(e),
        };

        extract_records(site, &html, max_results)
    }
}
