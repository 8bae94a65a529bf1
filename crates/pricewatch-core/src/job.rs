use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Marketplace;

/// Status of a scrape job.
///
/// Transitions are one-directional: `pending` (or `scheduled`) → `running`
/// → one of the terminal states. The only externally-driven transition is
/// an admin cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether an admin cancel is still meaningful.
    pub fn is_cancellable(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Severity level of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "success" => Ok(LogLevel::Success),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Append-only progress log entry owned by a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Counters aggregated over one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub products_scraped: u32,
    pub products_found: u32,
    pub errors_count: u32,
}

impl JobCounters {
    pub fn summary(&self) -> String {
        format!(
            "Products scraped: {}, Found: {}, Errors: {}",
            self.products_scraped, self.products_found, self.errors_count
        )
    }
}

/// A scrape job: one unit of work against one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub name: String,
    pub site_id: Uuid,
    pub term_list_id: Option<Uuid>,
    pub marketplace: Marketplace,
    pub status: JobStatus,
    pub products_scraped: u32,
    pub products_found: u32,
    pub errors_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Latest progress message, mirrored from the job log for cheap polling.
    pub current_progress: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub auto_start: bool,
}

impl ScrapeJob {
    pub fn counters(&self) -> JobCounters {
        JobCounters {
            products_scraped: self.products_scraped,
            products_found: self.products_found,
            errors_count: self.errors_count,
        }
    }

    /// Whether the dispatcher should run this job now.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Pending => self.auto_start,
            JobStatus::Scheduled => self.scheduled_at.is_some_and(|at| at <= now),
            _ => false,
        }
    }
}

/// Request to create a new scrape job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub name: String,
    pub site_id: Uuid,
    pub term_list_id: Option<Uuid>,
    pub marketplace: Marketplace,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub auto_start: bool,
}

impl CreateJobRequest {
    pub fn new(name: impl Into<String>, site_id: Uuid, marketplace: Marketplace) -> Self {
        Self {
            name: name.into(),
            site_id,
            term_list_id: None,
            marketplace,
            scheduled_at: None,
            auto_start: true,
        }
    }

    pub fn with_term_list(mut self, list_id: Uuid) -> Self {
        self.term_list_id = Some(list_id);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self.auto_start = false;
        self
    }
}
