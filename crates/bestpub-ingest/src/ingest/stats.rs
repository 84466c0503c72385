//! Run statistics
//!
//! Counters owned by the orchestrator and read by the introspection API.
//! Kept in memory only; a restart resets them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub last_run_time: Option<DateTime<Utc>>,
    pub number_of_runs: u64,
    /// Archives discovered in the current run and not yet processed
    pub zip_queue_size: usize,
    pub archives_succeeded: u64,
    pub archives_failed: u64,
    pub last_run: Option<RunSummary>,
}

/// Shared handle to [`RunStats`]; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<RwLock<RunStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters
    pub async fn snapshot(&self) -> RunStats {
        self.inner.read().await.clone()
    }

    pub(crate) async fn begin_run(&self) {
        let mut stats = self.inner.write().await;
        stats.last_run_time = Some(Utc::now());
        stats.number_of_runs += 1;
        stats.zip_queue_size = 0;
    }

    pub(crate) async fn set_queue_size(&self, size: usize) {
        self.inner.write().await.zip_queue_size = size;
    }

    /// Record one processed archive and shrink the queue
    pub(crate) async fn archive_done(&self, succeeded: bool) {
        let mut stats = self.inner.write().await;
        stats.zip_queue_size = stats.zip_queue_size.saturating_sub(1);
        if succeeded {
            stats.archives_succeeded += 1;
        } else {
            stats.archives_failed += 1;
        }
    }

    pub(crate) async fn end_run(&self, summary: RunSummary) {
        let mut stats = self.inner.write().await;
        stats.zip_queue_size = 0;
        stats.last_run = Some(summary);
    }
}
