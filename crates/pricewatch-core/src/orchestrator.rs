//! Job orchestration: one scrape job end to end.
//!
//! A job runs its search terms sequentially against one site, persists
//! every candidate listing, then matches and classifies each one inline
//! so a violation is visible as soon as its listing is stored. Per-term
//! and per-record failures increment the error counter and the run
//! continues; only configuration errors fail the job outright.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::AggregateCache;
use crate::classify::ComplianceChecker;
use crate::error::AppError;
use crate::job::{JobCounters, LogLevel, ScrapeJob};
use crate::matcher::find_candidates;
use crate::models::{Marketplace, NewScrapedProduct, SiteConfig};
use crate::traits::{CatalogStore, JobStore, ProductStore, SearchEngine, ViolationStore};

/// Candidate listings requested per search term.
pub const MAX_RESULTS_PER_TERM: usize = 10;

/// Events emitted during a job run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum JobEvent<'a> {
    Started {
        job: &'a ScrapeJob,
        site: &'a str,
    },
    TermStarted {
        job_id: Uuid,
        term: &'a str,
        index: usize,
        total: usize,
    },
    NoResults {
        job_id: Uuid,
        term: &'a str,
    },
    TermFailed {
        job_id: Uuid,
        term: &'a str,
        error: &'a str,
    },
    CandidateSaved {
        job_id: Uuid,
        name: &'a str,
        price: f64,
    },
    RecordFailed {
        job_id: Uuid,
        name: &'a str,
        error: &'a str,
    },
    Completed {
        job_id: Uuid,
        counters: JobCounters,
    },
    Failed {
        job_id: Uuid,
        error: &'a str,
    },
    Cancelled {
        job_id: Uuid,
        counters: JobCounters,
    },
}

/// Trait for receiving job events (decoupled logging).
pub trait JobReporter: Send + Sync {
    fn report(&self, event: JobEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn report(&self, event: JobEvent<'_>) {
        match event {
            JobEvent::Started { job, site } => {
                tracing::info!(job_id = %job.id, %site, "Job started");
            }
            JobEvent::TermStarted {
                job_id,
                term,
                index,
                total,
            } => {
                tracing::info!(%job_id, %term, "Searching term {}/{}", index + 1, total);
            }
            JobEvent::NoResults { job_id, term } => {
                tracing::warn!(%job_id, %term, "No results for term");
            }
            JobEvent::TermFailed { job_id, term, error } => {
                tracing::warn!(%job_id, %term, %error, "Term failed");
            }
            JobEvent::CandidateSaved { job_id, name, price } => {
                tracing::debug!(%job_id, %name, %price, "Candidate saved");
            }
            JobEvent::RecordFailed { job_id, name, error } => {
                tracing::warn!(%job_id, %name, %error, "Record failed");
            }
            JobEvent::Completed { job_id, counters } => {
                tracing::info!(%job_id, summary = %counters.summary(), "Job completed");
            }
            JobEvent::Failed { job_id, error } => {
                tracing::error!(%job_id, %error, "Job failed");
            }
            JobEvent::Cancelled { job_id, counters } => {
                tracing::warn!(%job_id, summary = %counters.summary(), "Job cancelled");
            }
        }
    }
}

/// Runs one scrape job against one site.
pub struct JobRunner<E, C, P, V, J>
where
    E: SearchEngine,
    C: CatalogStore,
    P: ProductStore,
    V: ViolationStore,
    J: JobStore,
{
    engine: E,
    catalog: C,
    products: P,
    jobs: J,
    checker: ComplianceChecker<V>,
    cache: AggregateCache,
}

impl<E, C, P, V, J> JobRunner<E, C, P, V, J>
where
    E: SearchEngine,
    C: CatalogStore,
    P: ProductStore,
    V: ViolationStore,
    J: JobStore,
{
    pub fn new(engine: E, catalog: C, products: P, violations: V, jobs: J, cache: AggregateCache) -> Self {
        Self {
            engine,
            catalog,
            products,
            jobs,
            checker: ComplianceChecker::new(violations, cache.clone()),
            cache,
        }
    }

    /// Run the job to completion, cancellation or failure.
    ///
    /// Returns the final counters. A cancelled run is not an error: the
    /// job is marked cancelled and whatever was persisted so far stays.
    pub async fn run<R: JobReporter>(
        &self,
        job: &ScrapeJob,
        site: &SiteConfig,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<JobCounters, AppError> {
        reporter.report(JobEvent::Started { job, site: &site.name });
        self.jobs.mark_running(job.id).await?;
        self.jobs
            .append_log(job.id, LogLevel::Info, &format!("Job started against {}", site.name))
            .await?;

        let mut counters = JobCounters::default();

        if let Err(e) = self.validate_site(site) {
            return self.fail(job.id, e, counters, reporter).await;
        }

        let terms = match self.resolve_terms(job).await {
            Ok(terms) => terms,
            Err(e) => return self.fail(job.id, e, counters, reporter).await,
        };
        let catalog = match self.catalog.list_active().await {
            Ok(catalog) => catalog,
            Err(e) => return self.fail(job.id, e, counters, reporter).await,
        };

        let total = terms.len();
        for (index, term) in terms.iter().enumerate() {
            if cancel_token.is_cancelled() {
                return self.cancel(job.id, counters, reporter).await;
            }

            reporter.report(JobEvent::TermStarted {
                job_id: job.id,
                term,
                index,
                total,
            });

            let records = match self.engine.search(site, term, MAX_RESULTS_PER_TERM).await {
                Ok(records) => records,
                Err(e) if e.is_config_fatal() => {
                    return self.fail(job.id, e, counters, reporter).await;
                }
                Err(e) => {
                    counters.errors_count += 1;
                    let msg = e.to_string();
                    reporter.report(JobEvent::TermFailed {
                        job_id: job.id,
                        term,
                        error: &msg,
                    });
                    self.jobs
                        .append_log(job.id, LogLevel::Error, &format!("Term '{term}' failed: {msg}"))
                        .await?;
                    continue;
                }
            };

            counters.products_found += records.len() as u32;
            if records.is_empty() {
                reporter.report(JobEvent::NoResults { job_id: job.id, term });
                self.jobs
                    .append_log(job.id, LogLevel::Warning, &format!("No results for '{term}'"))
                    .await?;
                continue;
            }

            for record in &records {
                if cancel_token.is_cancelled() {
                    self.jobs.update_counters(job.id, counters).await?;
                    return self.cancel(job.id, counters, reporter).await;
                }

                let new_product =
                    NewScrapedProduct::from_record(record, site.id, term, Some(job.id));
                let scraped = match self.products.save(&new_product).await {
                    Ok(scraped) => scraped,
                    Err(e) => {
                        counters.errors_count += 1;
                        let msg = e.to_string();
                        reporter.report(JobEvent::RecordFailed {
                            job_id: job.id,
                            name: &record.name,
                            error: &msg,
                        });
                        continue;
                    }
                };
                counters.products_scraped += 1;
                reporter.report(JobEvent::CandidateSaved {
                    job_id: job.id,
                    name: &scraped.product_name,
                    price: scraped.listed_price,
                });

                let candidates = find_candidates(&scraped.product_name, &catalog);
                let check_result = match candidates.first() {
                    Some(best) => self
                        .checker
                        .check_pair(&best.product, &scraped)
                        .await
                        .map(|_| ()),
                    None => self.checker.record_no_match(&scraped).await.map(|_| ()),
                };
                if let Err(e) = check_result {
                    counters.errors_count += 1;
                    let msg = e.to_string();
                    reporter.report(JobEvent::RecordFailed {
                        job_id: job.id,
                        name: &scraped.product_name,
                        error: &msg,
                    });
                }
            }

            self.jobs.update_counters(job.id, counters).await?;
            self.jobs
                .append_log(
                    job.id,
                    LogLevel::Info,
                    &format!("Term '{term}': {} candidates", records.len()),
                )
                .await?;
        }

        self.jobs.complete(job.id, counters).await?;
        self.jobs
            .append_log(job.id, LogLevel::Success, &counters.summary())
            .await?;
        // Fresh data landed; cached aggregates are stale.
        self.cache.invalidate().await;
        reporter.report(JobEvent::Completed {
            job_id: job.id,
            counters,
        });
        Ok(counters)
    }

    fn validate_site(&self, site: &SiteConfig) -> Result<(), AppError> {
        if !site.is_active {
            return Err(AppError::ConfigError(format!(
                "Site '{}' is not active",
                site.name
            )));
        }
        // search_url() rejects an empty template.
        site.search_url("probe")?;
        if site.marketplace == Marketplace::Other {
            site.selectors.validate()?;
        }
        Ok(())
    }

    /// Terms come from the job's term list when it is usable, otherwise
    /// from the names of active regulated products.
    async fn resolve_terms(&self, job: &ScrapeJob) -> Result<Vec<String>, AppError> {
        if let Some(list_id) = job.term_list_id
            && let Some(list) = self.catalog.get_term_list(list_id).await?
            && list.is_active
            && !list.terms.is_empty()
        {
            return Ok(list.terms);
        }

        let terms: Vec<String> = self
            .catalog
            .list_active()
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        if terms.is_empty() {
            return Err(AppError::ConfigError(
                "No search terms available: term list unusable and catalog empty".to_string(),
            ));
        }
        Ok(terms)
    }

    async fn fail<R: JobReporter>(
        &self,
        job_id: Uuid,
        error: AppError,
        counters: JobCounters,
        reporter: &R,
    ) -> Result<JobCounters, AppError> {
        let msg = error.to_string();
        reporter.report(JobEvent::Failed {
            job_id,
            error: &msg,
        });
        self.jobs
            .append_log(job_id, LogLevel::Error, &format!("Job failed: {msg}"))
            .await?;
        self.jobs.fail(job_id, &msg, counters).await?;
        Err(error)
    }

    async fn cancel<R: JobReporter>(
        &self,
        job_id: Uuid,
        counters: JobCounters,
        reporter: &R,
    ) -> Result<JobCounters, AppError> {
        self.jobs
            .append_log(job_id, LogLevel::Warning, "Job cancelled")
            .await?;
        self.jobs.cancel(job_id).await?;
        reporter.report(JobEvent::Cancelled { job_id, counters });
        Ok(counters)
    }
}
