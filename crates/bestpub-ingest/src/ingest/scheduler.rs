//! Job scheduler
//!
//! Fires the orchestrator on a cron schedule after an initial start delay.
//! Each tick takes the named [`FileJobLock`] first, so only one node in a
//! cluster runs a cycle at a time; a tick that finds the lock taken is
//! skipped. Ticks are awaited in sequence, so runs never overlap in-process.

use anyhow::Result;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::lock::FileJobLock;
use super::orchestrator::IngestOrchestrator;
use super::stats::RunSummary;
use crate::config::ScheduleConfig;

pub struct JobScheduler {
    orchestrator: Arc<IngestOrchestrator>,
    schedule: cron::Schedule,
    start_delay: Duration,
    run_as: String,
    lock: FileJobLock,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(orchestrator: Arc<IngestOrchestrator>, config: &ScheduleConfig) -> Result<Self> {
        let schedule = cron::Schedule::from_str(&config.cron)
            .map_err(|e| anyhow::anyhow!("Invalid cron expression {:?}: {}", config.cron, e))?;
        Ok(Self {
            orchestrator,
            schedule,
            start_delay: Duration::from_secs(config.start_delay_secs),
            run_as: config.run_as.clone(),
            lock: FileJobLock::new(
                &config.lock_dir,
                &config.lock_name,
                Duration::from_secs(config.lock_ttl_secs),
            ),
        })
    }

    /// Start the scheduler in background until `shutdown` is cancelled
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                start_delay_secs = self.start_delay.as_secs(),
                "Ingestion scheduler started"
            );

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Ingestion scheduler stopped before first run");
                    return;
                },
                _ = sleep(self.start_delay) => {},
            }

            loop {
                let Some(delay) = self.next_delay() else {
                    warn!("Cron schedule has no upcoming occurrence");
                    break;
                };

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(delay) => {},
                }
                self.run_tick().await;
            }

            info!("Ingestion scheduler stopped");
        })
    }

    /// Time until the next cron occurrence
    pub fn next_delay(&self) -> Option<Duration> {
        let next = self.schedule.upcoming(Utc).next()?;
        Some((next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Take the job lock and run one cycle as the configured principal.
    ///
    /// Returns `None` when the lock is held elsewhere.
    pub async fn run_tick(&self) -> Option<RunSummary> {
        let span = info_span!("scheduled_run", run_as = %self.run_as);
        async {
            match self.lock.try_acquire().await {
                Ok(Some(_guard)) => Some(self.orchestrator.run().await),
                Ok(None) => {
                    info!(lock = %self.lock.path().display(), "Job lock held by another node, skipping run");
                    None
                },
                Err(e) => {
                    error!(lock = %self.lock.path().display(), error = %e, "Could not acquire job lock");
                    None
                },
            }
        }
        .instrument(span)
        .await
    }
}
