//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::{
    NewCheckReport, NewViolation, Violation, ViolationCheckReport, ViolationStatus,
};
use crate::error::AppError;
use crate::job::{CreateJobRequest, JobCounters, JobStatus, LogLevel, ScrapeJob};
use crate::models::{
    BrowserOptions, Marketplace, NewScrapedProduct, ProductRecord, RegulatedProduct,
    ScrapedProduct, SearchTermList, SelectorMap, SiteConfig,
};
use crate::orchestrator::{JobEvent, JobReporter};
use crate::traits::{CatalogStore, JobStore, ProductStore, SearchEngine, SiteStore, ViolationStore};

/// Fixed site id so jobs and site stores built separately line up.
const TEST_SITE_ID: Uuid = Uuid::from_u128(0x517e);

// ---------------------------------------------------------------------------
// MockEngine
// ---------------------------------------------------------------------------

/// Mock search engine returning configurable records per term.
#[derive(Clone)]
pub struct MockEngine {
    records: Arc<Mutex<Vec<ProductRecord>>>,
    failing_term: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockEngine {
    /// Engine that returns the same records for every term.
    pub fn returning(records: Vec<ProductRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            failing_term: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Engine that fails for terms containing `term` and returns
    /// `records` for everything else.
    pub fn failing_on(term: &str, records: Vec<ProductRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            failing_term: Arc::new(Mutex::new(Some(term.to_string()))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn search_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl SearchEngine for MockEngine {
    async fn search(
        &self,
        _site: &SiteConfig,
        term: &str,
        max_results: usize,
    ) -> Result<Vec<ProductRecord>, AppError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(failing) = self.failing_term.lock().unwrap().as_deref()
            && term.contains(failing)
        {
            return Err(AppError::NetworkError(format!("mock failure for '{term}'")));
        }
        let mut records = self.records.lock().unwrap().clone();
        records.truncate(max_results);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// MockSiteStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockSiteStore {
    sites: Arc<Mutex<Vec<SiteConfig>>>,
}

impl MockSiteStore {
    pub fn with_sites(sites: Vec<SiteConfig>) -> Self {
        Self {
            sites: Arc::new(Mutex::new(sites)),
        }
    }
}

impl SiteStore for MockSiteStore {
    async fn get(&self, site_id: Uuid) -> Result<Option<SiteConfig>, AppError> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == site_id)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<SiteConfig>, AppError> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MockCatalog
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockCatalog {
    products: Arc<Mutex<Vec<RegulatedProduct>>>,
    term_lists: Arc<Mutex<Vec<SearchTermList>>>,
}

impl MockCatalog {
    pub fn with_products(products: Vec<RegulatedProduct>) -> Self {
        Self {
            products: Arc::new(Mutex::new(products)),
            term_lists: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_term_list(&self, list: SearchTermList) {
        self.term_lists.lock().unwrap().push(list);
    }
}

impl CatalogStore for MockCatalog {
    async fn list_active(&self) -> Result<Vec<RegulatedProduct>, AppError> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn get_term_list(&self, list_id: Uuid) -> Result<Option<SearchTermList>, AppError> {
        Ok(self
            .term_lists
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == list_id)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MockProductStore
// ---------------------------------------------------------------------------

/// Mock product store that records saves.
#[derive(Clone)]
pub struct MockProductStore {
    saved: Arc<Mutex<Vec<ScrapedProduct>>>,
    save_error: Arc<Mutex<Option<AppError>>>,
}

impl MockProductStore {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_save_error(error: AppError) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            save_error: Arc::new(Mutex::new(Some(error))),
        }
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl Default for MockProductStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductStore for MockProductStore {
    async fn save(&self, product: &NewScrapedProduct) -> Result<ScrapedProduct, AppError> {
        let mut err = self.save_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        let scraped = ScrapedProduct {
            id: Uuid::new_v4(),
            product_name: product.product_name.clone(),
            marketplace: product.marketplace,
            site_id: product.site_id,
            search_term: product.search_term.clone(),
            listed_price: product.listed_price,
            original_price: product.original_price,
            url: product.url.clone(),
            image_url: product.image_url.clone(),
            availability: product.availability,
            seller_name: product.seller_name.clone(),
            rating: product.rating,
            job_id: product.job_id,
            scraped_at: Utc::now(),
        };
        self.saved.lock().unwrap().push(scraped.clone());
        Ok(scraped)
    }

    async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<ScrapedProduct>, AppError> {
        let mut products: Vec<ScrapedProduct> =
            self.saved.lock().unwrap().iter().rev().cloned().collect();
        if let Some(limit) = limit {
            products.truncate(limit as usize);
        }
        Ok(products)
    }
}

// ---------------------------------------------------------------------------
// MockViolationStore
// ---------------------------------------------------------------------------

/// Mock violation store with real upsert semantics, keyed on the
/// (regulated, scraped) pair like the database unique constraint.
#[derive(Clone)]
pub struct MockViolationStore {
    reports: Arc<Mutex<Vec<ViolationCheckReport>>>,
    violations: Arc<Mutex<Vec<Violation>>>,
}

impl MockViolationStore {
    pub fn new() -> Self {
        Self {
            reports: Arc::new(Mutex::new(Vec::new())),
            violations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.lock().unwrap().len()
    }

    pub fn last_report(&self) -> Option<ViolationCheckReport> {
        self.reports.lock().unwrap().last().cloned()
    }
}

impl Default for MockViolationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViolationStore for MockViolationStore {
    async fn upsert_report(&self, report: &NewCheckReport) -> Result<Uuid, AppError> {
        let mut reports = self.reports.lock().unwrap();
        if let Some(existing) = reports.iter_mut().find(|r| {
            r.regulated_product_id == report.regulated_product_id
                && r.scraped_product_id == report.scraped_product_id
        }) {
            existing.has_violation = report.has_violation;
            existing.compliance_status = report.compliance_status;
            existing.price_difference = report.price_difference;
            existing.percentage_difference = report.percentage_difference;
            existing.violation_severity = report.violation_severity;
            existing.proposed_penalty = report.proposed_penalty;
            existing.notes = report.notes.clone();
            existing.checked_at = Utc::now();
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        reports.push(ViolationCheckReport {
            id,
            regulated_product_id: report.regulated_product_id,
            scraped_product_id: report.scraped_product_id,
            has_violation: report.has_violation,
            compliance_status: report.compliance_status,
            price_difference: report.price_difference,
            percentage_difference: report.percentage_difference,
            violation_severity: report.violation_severity,
            proposed_penalty: report.proposed_penalty,
            notes: report.notes.clone(),
            violation_id: None,
            checked_at: Utc::now(),
        });
        Ok(id)
    }

    async fn link_report(&self, report_id: Uuid, violation_id: Uuid) -> Result<(), AppError> {
        let mut reports = self.reports.lock().unwrap();
        if let Some(report) = reports.iter_mut().find(|r| r.id == report_id) {
            report.violation_id = Some(violation_id);
        }
        Ok(())
    }

    async fn find_pending_violation(
        &self,
        regulated_product_id: Uuid,
        scraped_product_id: Uuid,
    ) -> Result<Option<Violation>, AppError> {
        Ok(self
            .violations
            .lock()
            .unwrap()
            .iter()
            .find(|v| {
                v.regulated_product_id == regulated_product_id
                    && v.scraped_product_id == scraped_product_id
                    && v.status == ViolationStatus::Pending
            })
            .cloned())
    }

    async fn create_violation(&self, violation: &NewViolation) -> Result<Violation, AppError> {
        let created = Violation {
            id: Uuid::new_v4(),
            regulated_product_id: violation.regulated_product_id,
            scraped_product_id: violation.scraped_product_id,
            violation_type: violation.violation_type.clone(),
            severity: violation.severity,
            proposed_penalty: violation.proposed_penalty,
            status: ViolationStatus::Pending,
            notes: violation.notes.clone(),
            created_at: Utc::now(),
            confirmed_at: None,
        };
        self.violations.lock().unwrap().push(created.clone());
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// MockJobStore
// ---------------------------------------------------------------------------

/// Mock job store backed by an in-memory map, with the same cancel guard
/// as the real repository.
#[derive(Clone)]
pub struct MockJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, ScrapeJob>>>,
    logs: Arc<Mutex<Vec<(Uuid, LogLevel, String)>>>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Insert a prebuilt job and return it.
    pub fn seed(&self, job: ScrapeJob) -> ScrapeJob {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        job
    }

    pub fn status_of(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.lock().unwrap().get(&job_id).map(|j| j.status)
    }

    pub fn logs_of(&self, job_id: Uuid) -> Vec<String> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == job_id)
            .map(|(_, _, msg)| msg.clone())
            .collect()
    }
}

impl Default for MockJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MockJobStore {
    async fn create(&self, request: &CreateJobRequest) -> Result<ScrapeJob, AppError> {
        let status = if request.scheduled_at.is_some() {
            JobStatus::Scheduled
        } else {
            JobStatus::Pending
        };
        let job = ScrapeJob {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            site_id: request.site_id,
            term_list_id: request.term_list_id,
            marketplace: request.marketplace,
            status,
            products_scraped: 0,
            products_found: 0,
            errors_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            current_progress: String::new(),
            scheduled_at: request.scheduled_at,
            auto_start: request.auto_start,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn mark_running(&self, job_id: Uuid) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_counters(&self, job_id: Uuid, counters: JobCounters) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.products_scraped = counters.products_scraped;
            job.products_found = counters.products_found;
            job.errors_count = counters.errors_count;
        }
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, counters: JobCounters) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.status = JobStatus::Completed;
            job.products_scraped = counters.products_scraped;
            job.products_found = counters.products_found;
            job.errors_count = counters.errors_count;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str, counters: JobCounters) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.products_scraped = counters.products_scraped;
            job.products_found = counters.products_found;
            job.errors_count = counters.errors_count;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn cancel(&self, job_id: Uuid) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id)
            && job.status.is_cancellable()
        {
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn append_log(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: &str,
    ) -> Result<(), AppError> {
        self.logs
            .lock()
            .unwrap()
            .push((job_id, level, message.to_string()));
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.current_progress = message.to_string();
        }
        Ok(())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScrapeJob>, AppError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.is_due(now))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// CollectingReporter
// ---------------------------------------------------------------------------

/// Job reporter that records event names for ordering assertions.
#[derive(Default)]
pub struct CollectingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl JobReporter for CollectingReporter {
    fn report(&self, event: JobEvent<'_>) {
        let label = match &event {
            JobEvent::Started { .. } => "started",
            JobEvent::TermStarted { .. } => "term_started",
            JobEvent::NoResults { .. } => "no_results",
            JobEvent::TermFailed { .. } => "term_failed",
            JobEvent::CandidateSaved { .. } => "candidate_saved",
            JobEvent::RecordFailed { .. } => "record_failed",
            JobEvent::Completed { .. } => "completed",
            JobEvent::Failed { .. } => "failed",
            JobEvent::Cancelled { .. } => "cancelled",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create an active regulated product.
pub fn make_regulated(name: &str, gov_price: f64) -> RegulatedProduct {
    RegulatedProduct {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: "grocery".to_string(),
        gov_price,
        unit: "unit".to_string(),
        description: String::new(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create a scraped listing snapshot.
pub fn make_scraped(name: &str, listed_price: f64) -> ScrapedProduct {
    ScrapedProduct {
        id: Uuid::new_v4(),
        product_name: name.to_string(),
        marketplace: Marketplace::Other,
        site_id: TEST_SITE_ID,
        search_term: name.to_lowercase(),
        listed_price,
        original_price: None,
        url: "https://shop.example.com/item/1".to_string(),
        image_url: String::new(),
        availability: true,
        seller_name: "Example Seller".to_string(),
        rating: None,
        job_id: None,
        scraped_at: Utc::now(),
    }
}

/// Create an active site config with valid generic selectors.
pub fn make_test_site() -> SiteConfig {
    SiteConfig {
        id: TEST_SITE_ID,
        name: "Example Shop".to_string(),
        base_url: "https://shop.example.com".to_string(),
        search_url_template: "https://shop.example.com/search?q={query}".to_string(),
        marketplace: Marketplace::Other,
        selectors: SelectorMap {
            container: ".product".to_string(),
            name: ".title".to_string(),
            price: ".price".to_string(),
            url: "a".to_string(),
            image: "img".to_string(),
            availability: ".stock".to_string(),
        },
        headers: HashMap::new(),
        rate_limit_delay: 0.0,
        is_active: true,
        use_browser: false,
        fallback_to_browser: false,
        browser: BrowserOptions::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Create a pending auto-start job against the test site.
pub fn make_test_job() -> ScrapeJob {
    ScrapeJob {
        id: Uuid::new_v4(),
        name: "test-job".to_string(),
        site_id: TEST_SITE_ID,
        term_list_id: None,
        marketplace: Marketplace::Other,
        status: JobStatus::Pending,
        products_scraped: 0,
        products_found: 0,
        errors_count: 0,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
        error_message: None,
        current_progress: String::new(),
        scheduled_at: None,
        auto_start: true,
    }
}

/// Create an engine candidate record.
pub fn make_record(name: &str, price: f64) -> ProductRecord {
    ProductRecord {
        name: name.to_string(),
        price,
        original_price: None,
        url: "https://shop.example.com/item/1".to_string(),
        image_url: String::new(),
        availability: true,
        seller_name: "Example Seller".to_string(),
        rating: None,
        marketplace: Marketplace::Other,
    }
}
