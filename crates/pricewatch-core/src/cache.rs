//! Short-lived cache for expensive violation aggregates.
//!
//! Aggregate queries (the violation report, the stats rollup) scan whole
//! tables and back admin views that are polled frequently. Entries live
//! for five minutes and the whole cache is dropped whenever a violation
//! is saved or changes status, so a stale aggregate never outlives the
//! write that invalidated it.

use std::time::Duration;

use moka::future::Cache;

pub const VIOLATION_REPORT_KEY: &str = "violation_report";
pub const VIOLATION_STATS_KEY: &str = "violation_stats";

const TTL: Duration = Duration::from_secs(300);
const MAX_ENTRIES: u64 = 64;

/// Keyed cache of JSON aggregates with a fixed TTL.
#[derive(Clone)]
pub struct AggregateCache {
    inner: Cache<String, serde_json::Value>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(TTL)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: &str, value: serde_json::Value) {
        self.inner.insert(key.to_string(), value).await;
    }

    /// Drop every cached aggregate. Called on violation writes.
    pub async fn invalidate(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for AggregateCache {
    fn default() -> Self {
        Self::new()
    }
}
