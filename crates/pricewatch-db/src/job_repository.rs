use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use pricewatch_core::error::AppError;
use pricewatch_core::job::{
    CreateJobRequest, JobCounters, JobLogEntry, JobStatus, LogLevel, ScrapeJob,
};
use pricewatch_core::models::Marketplace;

/// Repository for scrape jobs and their progress logs.
///
/// Status transitions are enforced in SQL where races matter: cancel only
/// touches non-terminal rows, so a cancel that loses the race against
/// completion is a no-op rather than a corruption.
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a job. A `scheduled_at` in the request puts the job in
    /// `scheduled` state; otherwise it starts out `pending`.
    pub async fn create(&self, request: &CreateJobRequest) -> Result<ScrapeJob, AppError> {
        let status = if request.scheduled_at.is_some() {
            JobStatus::Scheduled
        } else {
            JobStatus::Pending
        };

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO scrape_jobs (
                name, site_id, term_list_id, marketplace, status,
                scheduled_at, auto_start
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(request.site_id)
        .bind(request.term_list_id)
        .bind(request.marketplace.as_str())
        .bind(status.as_str())
        .bind(request.scheduled_at)
        .bind(request.auto_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.into())
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM scrape_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn mark_running(&self, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = 'running', started_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'scheduled')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn update_counters(
        &self,
        job_id: Uuid,
        counters: JobCounters,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET products_scraped = $2, products_found = $3, errors_count = $4
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(counters.products_scraped as i32)
        .bind(counters.products_found as i32)
        .bind(counters.errors_count as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn complete(&self, job_id: Uuid, counters: JobCounters) -> Result<(), AppError> {
        self.finish(job_id, JobStatus::Completed, None, counters)
            .await
    }

    pub async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        counters: JobCounters,
    ) -> Result<(), AppError> {
        self.finish(job_id, JobStatus::Failed, Some(error), counters)
            .await
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
        counters: JobCounters,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = $2, error_message = $3, completed_at = NOW(),
                products_scraped = $4, products_found = $5, errors_count = $6
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error)
        .bind(counters.products_scraped as i32)
        .bind(counters.products_found as i32)
        .bind(counters.errors_count as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Cancel a job. Terminal jobs are left untouched.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE scrape_jobs
            SET status = 'cancelled', completed_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'scheduled', 'running')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn append_log(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query("INSERT INTO job_logs (job_id, level, message) VALUES ($1, $2, $3)")
            .bind(job_id)
            .bind(level.as_str())
            .bind(message)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query("UPDATE scrape_jobs SET current_progress = $2 WHERE id = $1")
            .bind(job_id)
            .bind(message)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScrapeJob>, AppError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM scrape_jobs
            WHERE (status = 'pending' AND auto_start)
               OR (status = 'scheduled' AND scheduled_at <= $1)
            ORDER BY created_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: i64,
    ) -> Result<Vec<ScrapeJob>, AppError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM scrape_jobs
            WHERE $1::VARCHAR IS NULL OR status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Latest log entries for a job, newest first.
    pub async fn tail_logs(&self, job_id: Uuid, limit: i64) -> Result<Vec<JobLogEntry>, AppError> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT * FROM job_logs
            WHERE job_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    site_id: Uuid,
    term_list_id: Option<Uuid>,
    marketplace: String,
    status: String,
    products_scraped: i32,
    products_found: i32,
    errors_count: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    current_progress: String,
    scheduled_at: Option<DateTime<Utc>>,
    auto_start: bool,
}

impl From<JobRow> for ScrapeJob {
    fn from(row: JobRow) -> Self {
        ScrapeJob {
            id: row.id,
            name: row.name,
            site_id: row.site_id,
            term_list_id: row.term_list_id,
            marketplace: row.marketplace.parse().unwrap_or(Marketplace::Other),
            status: row.status.parse().unwrap_or(JobStatus::Pending),
            products_scraped: row.products_scraped.max(0) as u32,
            products_found: row.products_found.max(0) as u32,
            errors_count: row.errors_count.max(0) as u32,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            current_progress: row.current_progress,
            scheduled_at: row.scheduled_at,
            auto_start: row.auto_start,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    job_id: Uuid,
    level: String,
    message: String,
    timestamp: DateTime<Utc>,
}

impl From<LogRow> for JobLogEntry {
    fn from(row: LogRow) -> Self {
        JobLogEntry {
            id: row.id,
            job_id: row.job_id,
            level: row.level.parse().unwrap_or(LogLevel::Info),
            message: row.message,
            timestamp: row.timestamp,
        }
    }
}

// -- Trait implementation --

impl pricewatch_core::traits::JobStore for JobRepository {
    async fn create(&self, request: &CreateJobRequest) -> Result<ScrapeJob, AppError> {
        JobRepository::create(self, request).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        JobRepository::get(self, job_id).await
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<(), AppError> {
        JobRepository::mark_running(self, job_id).await
    }

    async fn update_counters(&self, job_id: Uuid, counters: JobCounters) -> Result<(), AppError> {
        JobRepository::update_counters(self, job_id, counters).await
    }

    async fn complete(&self, job_id: Uuid, counters: JobCounters) -> Result<(), AppError> {
        JobRepository::complete(self, job_id, counters).await
    }

    async fn fail(&self, job_id: Uuid, error: &str, counters: JobCounters) -> Result<(), AppError> {
        JobRepository::fail(self, job_id, error, counters).await
    }

    async fn cancel(&self, job_id: Uuid) -> Result<(), AppError> {
        JobRepository::cancel(self, job_id).await
    }

    async fn append_log(&self, job_id: Uuid, level: LogLevel, message: &str) -> Result<(), AppError> {
        JobRepository::append_log(self, job_id, level, message).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScrapeJob>, AppError> {
        JobRepository::list_due(self, now).await
    }
}
