pub mod cache;
pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod price;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::AggregateCache;
pub use classify::{ComplianceStatus, Severity, ViolationStats, ViolationStatus, classify};
pub use error::AppError;
pub use job::{CreateJobRequest, JobCounters, JobStatus, LogLevel, ScrapeJob};
pub use models::{
    Marketplace, ProductRecord, RegulatedProduct, ScrapedProduct, SiteConfig, VIOLATION_TOLERANCE,
};
pub use price::parse_price;
pub use traits::{
    CatalogStore, Fetcher, JobStore, ProductStore, SearchEngine, SiteStore, ViolationStore,
};
