use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Tolerance band above the regulated price before a listing counts
/// as a violation (10%).
pub const VIOLATION_TOLERANCE: f64 = 1.10;

/// Marketplace a site belongs to; selects the extraction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Amazon,
    Ebay,
    Walmart,
    Other,
}

impl Marketplace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Amazon => "amazon",
            Marketplace::Ebay => "ebay",
            Marketplace::Walmart => "walmart",
            Marketplace::Other => "other",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amazon" => Ok(Marketplace::Amazon),
            "ebay" => Ok(Marketplace::Ebay),
            "walmart" => Ok(Marketplace::Walmart),
            "other" => Ok(Marketplace::Other),
            _ => Err(format!("Unknown marketplace: {}", s)),
        }
    }
}

/// A catalog entry with a government-set reference price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatedProduct {
    pub id: Uuid,
    /// Unique, matched case-insensitively.
    pub name: String,
    pub category: String,
    pub gov_price: f64,
    pub unit: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegulatedProduct {
    /// Compliance boundary: 110% of the regulated price. Derived, never stored.
    pub fn violation_threshold(&self) -> f64 {
        self.gov_price * VIOLATION_TOLERANCE
    }
}

/// CSS selectors driving the generic extraction engine.
///
/// `container`, `name` and `price` are required; the rest degrade
/// gracefully when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorMap {
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub availability: String,
}

impl SelectorMap {
    /// Validate that the selectors required by the generic engine are set.
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("container", &self.container),
            ("name", &self.name),
            ("price", &self.price),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Missing required selector '{field}'"
                )));
            }
        }
        Ok(())
    }
}

/// Browser-rendering options for sites that need a headless browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Seconds to wait for the results container before giving up.
    pub page_load_timeout: u64,
    /// Selector whose presence signals that results have rendered.
    pub wait_selector: String,
    pub screenshot_on_error: bool,
    pub disable_images: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            page_load_timeout: 30,
            wait_selector: "body".to_string(),
            screenshot_on_error: true,
            disable_images: true,
        }
    }
}

/// Configuration for one marketplace site to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    /// Search URL template with a `{query}` placeholder.
    pub search_url_template: String,
    pub marketplace: Marketplace,
    pub selectors: SelectorMap,
    pub headers: HashMap<String, String>,
    /// Seconds to sleep before each request to this site.
    pub rate_limit_delay: f64,
    pub is_active: bool,
    /// Always render through the browser, skipping the direct fetch path.
    pub use_browser: bool,
    /// Escalate to the browser when the direct fetch fails or looks
    /// bot-protected.
    pub fallback_to_browser: bool,
    pub browser: BrowserOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay.max(0.0))
    }

    /// Substitute the query into the search URL template.
    pub fn search_url(&self, query: &str) -> Result<String, AppError> {
        if self.search_url_template.trim().is_empty() {
            return Err(AppError::ConfigError(
                "No search URL template configured".to_string(),
            ));
        }
        let encoded = urlencode(query);
        Ok(self.search_url_template.replace("{query}", &encoded))
    }
}

/// Percent-encode a search query for use in a URL query string
/// (spaces become `+`).
pub fn urlencode(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.as_bytes()).collect()
}

/// Named, ordered list of search strings owned by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTermList {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub terms: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One candidate listing extracted from a search-results page.
///
/// Engines discard candidates with no resolvable name or no parsable
/// positive price before returning, so both fields are always set here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub url: String,
    pub image_url: String,
    pub availability: bool,
    pub seller_name: String,
    pub rating: Option<f64>,
    pub marketplace: Marketplace,
}

/// Denormalized snapshot of one marketplace listing at scrape time.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub id: Uuid,
    pub product_name: String,
    pub marketplace: Marketplace,
    pub site_id: Uuid,
    pub search_term: String,
    pub listed_price: f64,
    pub original_price: Option<f64>,
    pub url: String,
    pub image_url: String,
    pub availability: bool,
    pub seller_name: String,
    pub rating: Option<f64>,
    pub job_id: Option<Uuid>,
    pub scraped_at: DateTime<Utc>,
}

/// DTO for inserting a new scraped product.
#[derive(Debug, Clone, Serialize)]
pub struct NewScrapedProduct {
    pub product_name: String,
    pub marketplace: Marketplace,
    pub site_id: Uuid,
    pub search_term: String,
    pub listed_price: f64,
    pub original_price: Option<f64>,
    pub url: String,
    pub image_url: String,
    pub availability: bool,
    pub seller_name: String,
    pub rating: Option<f64>,
    pub job_id: Option<Uuid>,
}

impl NewScrapedProduct {
    /// Build an insert DTO from an engine candidate.
    pub fn from_record(
        record: &ProductRecord,
        site_id: Uuid,
        search_term: &str,
        job_id: Option<Uuid>,
    ) -> Self {
        Self {
            product_name: record.name.clone(),
            marketplace: record.marketplace,
            site_id,
            search_term: search_term.to_string(),
            listed_price: record.price,
            original_price: record.original_price,
            url: record.url.clone(),
            image_url: record.image_url.clone(),
            availability: record.availability,
            seller_name: record.seller_name.clone(),
            rating: record.rating,
            job_id,
        }
    }
}
