use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{BrowserOptions, Marketplace, SelectorMap, SiteConfig};

/// Repository for marketplace site configurations.
///
/// Selectors, headers and browser options live in JSONB columns so a site
/// can be reconfigured without a schema change.
#[derive(Clone)]
pub struct SiteRepository {
    pool: Pool<Postgres>,
}

impl SiteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, site: &SiteConfig) -> Result<SiteConfig, AppError> {
        let row = sqlx::query_as::<_, SiteRow>(
            r#"
            INSERT INTO sites (
                name, base_url, search_url_template, marketplace, selectors,
                headers, rate_limit_delay, is_active, use_browser,
                fallback_to_browser, browser
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&site.name)
        .bind(&site.base_url)
        .bind(&site.search_url_template)
        .bind(site.marketplace.as_str())
        .bind(serde_json::to_value(&site.selectors)?)
        .bind(serde_json::to_value(&site.headers)?)
        .bind(site.rate_limit_delay)
        .bind(site.is_active)
        .bind(site.use_browser)
        .bind(site.fallback_to_browser)
        .bind(serde_json::to_value(&site.browser)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.try_into()
    }

    pub async fn get(&self, site_id: Uuid) -> Result<Option<SiteConfig>, AppError> {
        let row = sqlx::query_as::<_, SiteRow>("SELECT * FROM sites WHERE id = $1")
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_active(&self) -> Result<Vec<SiteConfig>, AppError> {
        let rows = sqlx::query_as::<_, SiteRow>(
            "SELECT * FROM sites WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SiteRow {
    id: Uuid,
    name: String,
    base_url: String,
    search_url_template: String,
    marketplace: String,
    selectors: serde_json::Value,
    headers: serde_json::Value,
    rate_limit_delay: f64,
    is_active: bool,
    use_browser: bool,
    fallback_to_browser: bool,
    browser: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SiteRow> for SiteConfig {
    type Error = AppError;

    fn try_from(row: SiteRow) -> Result<Self, AppError> {
        let browser: BrowserOptions = if row.browser.as_object().is_some_and(|o| !o.is_empty()) {
            serde_json::from_value(row.browser)?
        } else {
            BrowserOptions::default()
        };
        let selectors: SelectorMap = serde_json::from_value(row.selectors)?;
        let headers: HashMap<String, String> = serde_json::from_value(row.headers)?;

        Ok(SiteConfig {
            id: row.id,
            name: row.name,
            base_url: row.base_url,
            search_url_template: row.search_url_template,
            marketplace: row.marketplace.parse().unwrap_or(Marketplace::Other),
            selectors,
            headers,
            rate_limit_delay: row.rate_limit_delay,
            is_active: row.is_active,
            use_browser: row.use_browser,
            fallback_to_browser: row.fallback_to_browser,
            browser,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// -- Trait implementation --

impl pricewatch_core::traits::SiteStore for SiteRepository {
    async fn get(&self, site_id: Uuid) -> Result<Option<SiteConfig>, AppError> {
        SiteRepository::get(self, site_id).await
    }

    async fn list_active(&self) -> Result<Vec<SiteConfig>, AppError> {
        SiteRepository::list_active(self).await
    }
}
