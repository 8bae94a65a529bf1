//! Dispatch layer between job storage and job execution.
//!
//! The dispatcher owns one cancellation token per in-flight job. Submit
//! spawns the run on a tokio task; cancel flips the token for a running
//! job or marks a queued job cancelled directly in the store. One spawned
//! task per job — terms within a job stay sequential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::AggregateCache;
use crate::error::AppError;
use crate::job::{JobCounters, ScrapeJob};
use crate::orchestrator::{JobRunner, TracingJobReporter};
use crate::traits::{CatalogStore, JobStore, ProductStore, SearchEngine, SiteStore, ViolationStore};

/// Handle to one spawned job run.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub token: CancellationToken,
    pub task: JoinHandle<Result<JobCounters, AppError>>,
}

/// Submits, schedules and cancels scrape jobs.
pub struct JobDispatcher<E, S, C, P, V, J>
where
    E: SearchEngine + 'static,
    S: SiteStore + 'static,
    C: CatalogStore + 'static,
    P: ProductStore + 'static,
    V: ViolationStore + 'static,
    J: JobStore + 'static,
{
    runner: Arc<JobRunner<E, C, P, V, J>>,
    sites: S,
    jobs: J,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl<E, S, C, P, V, J> JobDispatcher<E, S, C, P, V, J>
where
    E: SearchEngine + 'static,
    S: SiteStore + 'static,
    C: CatalogStore + 'static,
    P: ProductStore + 'static,
    V: ViolationStore + 'static,
    J: JobStore + 'static,
{
    pub fn new(
        engine: E,
        sites: S,
        catalog: C,
        products: P,
        violations: V,
        jobs: J,
        cache: AggregateCache,
    ) -> Self {
        Self {
            runner: Arc::new(JobRunner::new(
                engine, catalog, products, violations, jobs.clone(), cache,
            )),
            sites,
            jobs,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a run for this job. The token is registered before the task
    /// starts so a cancel arriving immediately after submit still lands.
    pub async fn submit(&self, job: ScrapeJob) -> Result<JobHandle, AppError> {
        let site = self
            .sites
            .get(job.site_id)
            .await?
            .ok_or_else(|| AppError::ConfigError(format!("Unknown site {}", job.site_id)))?;

        let token = CancellationToken::new();
        self.active
            .lock()
            .expect("dispatcher registry lock poisoned")
            .insert(job.id, token.clone());

        let runner = Arc::clone(&self.runner);
        let active = Arc::clone(&self.active);
        let job_id = job.id;
        let run_token = token.clone();
        let task = tokio::spawn(async move {
            let result = runner
                .run(&job, &site, run_token, &TracingJobReporter)
                .await;
            active
                .lock()
                .expect("dispatcher registry lock poisoned")
                .remove(&job_id);
            result
        });

        Ok(JobHandle { job_id, token, task })
    }

    /// Cancel a job wherever it is.
    ///
    /// A running job gets its token flipped and stops at the next term or
    /// record boundary; a queued job is marked cancelled in the store.
    /// Returns `false` when the job is already terminal.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool, AppError> {
        let token = self
            .active
            .lock()
            .expect("dispatcher registry lock poisoned")
            .get(&job_id)
            .cloned();
        if let Some(token) = token {
            token.cancel();
            return Ok(true);
        }

        match self.jobs.get(job_id).await? {
            Some(job) if job.status.is_cancellable() => {
                self.jobs.cancel(job_id).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::Generic(format!("Job {job_id} not found"))),
        }
    }

    /// Whether a run for this job is currently in flight.
    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.active
            .lock()
            .expect("dispatcher registry lock poisoned")
            .contains_key(&job_id)
    }

    /// Start every job that is due: auto-start pending jobs and scheduled
    /// jobs whose time has arrived. Returns the spawned handles.
    pub async fn run_due(&self) -> Result<Vec<JobHandle>, AppError> {
        let due = self.jobs.list_due(Utc::now()).await?;
        let mut handles = Vec::with_capacity(due.len());
        for job in due {
            if self.is_running(job.id) {
                continue;
            }
            handles.push(self.submit(job).await?);
        }
        Ok(handles)
    }
}
