use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};

use pricewatch_core::error::AppError;

use crate::catalog_repository::CatalogRepository;
use crate::config::DatabaseConfig;
use crate::job_repository::JobRepository;
use crate::product_repository::ScrapedProductRepository;
use crate::site_repository::SiteRepository;
use crate::violation_repository::ViolationRepository;

/// Handle to the Postgres database. Cheap to clone; all repositories
/// share the same pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Connect using the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to database"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool, mainly for tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        tracing::info!("Migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a [`CatalogRepository`] backed by this pool.
    pub fn catalog_repo(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Get a [`SiteRepository`] backed by this pool.
    pub fn site_repo(&self) -> SiteRepository {
        SiteRepository::new(self.pool.clone())
    }

    /// Get a [`ScrapedProductRepository`] backed by this pool.
    pub fn product_repo(&self) -> ScrapedProductRepository {
        ScrapedProductRepository::new(self.pool.clone())
    }

    /// Get a [`ViolationRepository`] backed by this pool.
    pub fn violation_repo(&self) -> ViolationRepository {
        ViolationRepository::new(self.pool.clone())
    }

    /// Get a [`JobRepository`] backed by this pool.
    pub fn job_repo(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }
}
