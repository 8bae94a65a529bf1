//! Core abstractions for scraping and persistence.
//!
//! These traits use RPITIT (Rust 1.75+) instead of `async_trait` for zero-cost
//! async abstractions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::{NewCheckReport, NewViolation, Violation};
use crate::error::AppError;
use crate::job::{CreateJobRequest, JobCounters, LogLevel, ScrapeJob};
use crate::models::{
    NewScrapedProduct, ProductRecord, RegulatedProduct, ScrapedProduct, SearchTermList, SiteConfig,
};

/// Fetches raw HTML for a site, honouring its headers and rate limit.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        site: &SiteConfig,
        url: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Runs one search against a site and extracts candidate listings.
///
/// At most `max_results` candidates are returned per search. Candidates
/// with no resolvable name or no parsable positive price are dropped
/// before returning; an empty `Vec` is a valid outcome.
pub trait SearchEngine: Send + Sync + Clone {
    fn search(
        &self,
        site: &SiteConfig,
        term: &str,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<ProductRecord>, AppError>> + Send;
}

/// Read access to site configurations.
pub trait SiteStore: Send + Sync + Clone {
    fn get(
        &self,
        site_id: Uuid,
    ) -> impl Future<Output = Result<Option<SiteConfig>, AppError>> + Send;

    fn list_active(&self) -> impl Future<Output = Result<Vec<SiteConfig>, AppError>> + Send;
}

/// Read access to the regulated catalog and search-term lists.
pub trait CatalogStore: Send + Sync + Clone {
    fn list_active(&self) -> impl Future<Output = Result<Vec<RegulatedProduct>, AppError>> + Send;

    fn get_term_list(
        &self,
        list_id: Uuid,
    ) -> impl Future<Output = Result<Option<SearchTermList>, AppError>> + Send;
}

/// Persists scraped listing snapshots.
pub trait ProductStore: Send + Sync + Clone {
    /// Insert a snapshot. Returns the stored row.
    fn save(
        &self,
        product: &NewScrapedProduct,
    ) -> impl Future<Output = Result<ScrapedProduct, AppError>> + Send;

    /// Most recent snapshots first. `None` means no limit.
    fn list_recent(
        &self,
        limit: Option<i64>,
    ) -> impl Future<Output = Result<Vec<ScrapedProduct>, AppError>> + Send;
}

/// Persists check reports and violations.
///
/// Reports are keyed on the (regulated, scraped) pair: a second upsert for
/// the same pair must update the existing row, not insert a new one.
pub trait ViolationStore: Send + Sync + Clone {
    /// Insert or update the report for its pair. Returns the report id.
    fn upsert_report(
        &self,
        report: &NewCheckReport,
    ) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Point a report at the violation it evidences.
    fn link_report(
        &self,
        report_id: Uuid,
        violation_id: Uuid,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn find_pending_violation(
        &self,
        regulated_product_id: Uuid,
        scraped_product_id: Uuid,
    ) -> impl Future<Output = Result<Option<Violation>, AppError>> + Send;

    fn create_violation(
        &self,
        violation: &NewViolation,
    ) -> impl Future<Output = Result<Violation, AppError>> + Send;
}

/// Persists scrape jobs, their counters and their progress logs.
pub trait JobStore: Send + Sync + Clone {
    fn create(
        &self,
        request: &CreateJobRequest,
    ) -> impl Future<Output = Result<ScrapeJob, AppError>> + Send;

    fn get(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// Transition to `running` and stamp `started_at`.
    fn mark_running(&self, job_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    fn update_counters(
        &self,
        job_id: Uuid,
        counters: JobCounters,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn complete(
        &self,
        job_id: Uuid,
        counters: JobCounters,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        counters: JobCounters,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Mark cancelled. A no-op for jobs already in a terminal state.
    fn cancel(&self, job_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Append to the job log and mirror the message into
    /// `current_progress` for cheap polling.
    fn append_log(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Jobs the dispatcher should start now: auto-start pending jobs and
    /// scheduled jobs whose time has arrived.
    fn list_due(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ScrapeJob>, AppError>> + Send;
}
