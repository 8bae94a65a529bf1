//! Per-marketplace extraction of listing candidates from search-result HTML.
//!
//! Amazon, eBay and Walmart have fixed, well-known markup; everything else
//! goes through the generic engine driven by the site's configured
//! selectors. All engines share the same discard rule: a candidate without
//! a resolvable name or a parsable positive price is dropped silently.

mod amazon;
mod ebay;
mod generic;
mod hybrid;
mod walmart;

pub use hybrid::HybridEngine;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{Marketplace, ProductRecord, SiteConfig};
use scraper::ElementRef;
use url::Url;

/// Extract up to `max_results` listing candidates from one
/// search-results page.
pub fn extract_records(
    site: &SiteConfig,
    html: &str,
    max_results: usize,
) -> Result<Vec<ProductRecord>, AppError> {
    let records = match site.marketplace {
        Marketplace::Amazon => amazon::extract(html, max_results),
        Marketplace::Ebay => ebay::extract(html, max_results),
        Marketplace::Walmart => walmart::extract(html, max_results),
        Marketplace::Other => generic::extract(site, html, max_results)?,
    };
    tracing::debug!(site = %site.name, count = records.len(), "Extracted candidates");
    Ok(records)
}

/// Concatenated text of an element with whitespace collapsed.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a possibly relative href against a base URL. Returns the href
/// unchanged when it is already absolute or the base is unusable.
pub(crate) fn resolve_url(base: &str, href: &str) -> String {
    if href.is_empty() || href.starts_with("http") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

/// First numeric token in a rating string like "4.5 out of 5 stars".
pub(crate) fn parse_rating(text: &str) -> Option<f64> {
    text.split_whitespace().find_map(|token| token.parse().ok())
}
