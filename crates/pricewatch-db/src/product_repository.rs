use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{Marketplace, NewScrapedProduct, ScrapedProduct};

/// Repository for scraped listing snapshots. Rows are immutable once
/// inserted.
#[derive(Clone)]
pub struct ScrapedProductRepository {
    pool: Pool<Postgres>,
}

impl ScrapedProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, product: &NewScrapedProduct) -> Result<ScrapedProduct, AppError> {
        let row = sqlx::query_as::<_, ScrapedProductRow>(
            r#"
            INSERT INTO scraped_products (
                product_name, marketplace, site_id, search_term, listed_price,
                original_price, url, image_url, availability, seller_name,
                rating, job_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&product.product_name)
        .bind(product.marketplace.as_str())
        .bind(product.site_id)
        .bind(&product.search_term)
        .bind(product.listed_price)
        .bind(product.original_price)
        .bind(&product.url)
        .bind(&product.image_url)
        .bind(product.availability)
        .bind(&product.seller_name)
        .bind(product.rating)
        .bind(product.job_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ScrapedProduct>, AppError> {
        let row =
            sqlx::query_as::<_, ScrapedProductRow>("SELECT * FROM scraped_products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Most recent snapshots first. `None` means no limit.
    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<ScrapedProduct>, AppError> {
        let rows = sqlx::query_as::<_, ScrapedProductRow>(
            r#"
            SELECT * FROM scraped_products
            ORDER BY scraped_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ScrapedProductRow {
    id: Uuid,
    product_name: String,
    marketplace: String,
    site_id: Uuid,
    search_term: String,
    listed_price: f64,
    original_price: Option<f64>,
    url: String,
    image_url: String,
    availability: bool,
    seller_name: String,
    rating: Option<f64>,
    job_id: Option<Uuid>,
    scraped_at: DateTime<Utc>,
}

impl From<ScrapedProductRow> for ScrapedProduct {
    fn from(row: ScrapedProductRow) -> Self {
        ScrapedProduct {
            id: row.id,
            product_name: row.product_name,
            marketplace: row.marketplace.parse().unwrap_or(Marketplace::Other),
            site_id: row.site_id,
            search_term: row.search_term,
            listed_price: row.listed_price,
            original_price: row.original_price,
            url: row.url,
            image_url: row.image_url,
            availability: row.availability,
            seller_name: row.seller_name,
            rating: row.rating,
            job_id: row.job_id,
            scraped_at: row.scraped_at,
        }
    }
}

// -- Trait implementation --

impl pricewatch_core::traits::ProductStore for ScrapedProductRepository {
    async fn save(&self, product: &NewScrapedProduct) -> Result<ScrapedProduct, AppError> {
        ScrapedProductRepository::save(self, product).await
    }

    async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<ScrapedProduct>, AppError> {
        ScrapedProductRepository::list_recent(self, limit).await
    }
}
