use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{RegulatedProduct, SearchTermList};

/// Repository for the regulated catalog and search-term lists.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a regulated product. The name must be unique
    /// case-insensitively.
    pub async fn create_product(
        &self,
        name: &str,
        category: &str,
        gov_price: f64,
        unit: &str,
    ) -> Result<RegulatedProduct, AppError> {
        let row = sqlx::query_as::<_, RegulatedProductRow>(
            r#"
            INSERT INTO regulated_products (name, category, gov_price, unit)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(category)
        .bind(gov_price)
        .bind(unit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Option<RegulatedProduct>, AppError> {
        let row = sqlx::query_as::<_, RegulatedProductRow>(
            "SELECT * FROM regulated_products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    /// Active catalog entries, name order.
    pub async fn list_active(&self) -> Result<Vec<RegulatedProduct>, AppError> {
        let rows = sqlx::query_as::<_, RegulatedProductRow>(
            "SELECT * FROM regulated_products WHERE is_active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create_term_list(
        &self,
        name: &str,
        terms: &[String],
    ) -> Result<SearchTermList, AppError> {
        let row = sqlx::query_as::<_, SearchTermListRow>(
            r#"
            INSERT INTO search_term_lists (name, terms)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(serde_json::to_value(terms)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.try_into()
    }

    pub async fn get_term_list(&self, list_id: Uuid) -> Result<Option<SearchTermList>, AppError> {
        let row = sqlx::query_as::<_, SearchTermListRow>(
            "SELECT * FROM search_term_lists WHERE id = $1",
        )
        .bind(list_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct RegulatedProductRow {
    id: Uuid,
    name: String,
    category: String,
    gov_price: f64,
    unit: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RegulatedProductRow> for RegulatedProduct {
    fn from(row: RegulatedProductRow) -> Self {
        RegulatedProduct {
            id: row.id,
            name: row.name,
            category: row.category,
            gov_price: row.gov_price,
            unit: row.unit,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SearchTermListRow {
    id: Uuid,
    name: String,
    description: String,
    terms: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<SearchTermListRow> for SearchTermList {
    type Error = AppError;

    fn try_from(row: SearchTermListRow) -> Result<Self, AppError> {
        Ok(SearchTermList {
            id: row.id,
            name: row.name,
            description: row.description,
            terms: serde_json::from_value(row.terms)?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

// -- Trait implementation --

impl pricewatch_core::traits::CatalogStore for CatalogRepository {
    async fn list_active(&self) -> Result<Vec<RegulatedProduct>, AppError> {
        CatalogRepository::list_active(self).await
    }

    async fn get_term_list(&self, list_id: Uuid) -> Result<Option<SearchTermList>, AppError> {
        CatalogRepository::get_term_list(self, list_id).await
    }
}
