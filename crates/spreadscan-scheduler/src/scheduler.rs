//! Cadence-driven job runner.
//!
//! Each venue job family fires on its own period and every invocation is
//! independent: failures are logged with the venue name and the next tick
//! retries. A job overrunning its period may overlap its own next
//! invocation; the upserts are idempotent so this is harmless. The sole
//! synchronization is the exclusion lock serializing the two differential
//! recomputations, which deadlocked the database when run concurrently.

use anyhow::Result;
use futures::future::BoxFuture;
use spreadscan_core::config::SchedulerConfig;
use spreadscan_data::DiffsRepository;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// A scheduled adapter operation over the shared pool.
pub type TaskFn = Arc<dyn Fn(PgPool) -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Clone)]
pub struct VenueJob {
    pub venue: &'static str,
    pub run: TaskFn,
}

impl VenueJob {
    pub fn new<F, Fut>(venue: &'static str, run: F) -> Self
    where
        F: Fn(PgPool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            venue,
            run: Arc::new(move |pool| Box::pin(run(pool))),
        }
    }
}

/// The three venue job registries, one per period.
#[derive(Clone, Default)]
pub struct JobSet {
    pub spot: Vec<VenueJob>,
    pub networks: Vec<VenueJob>,
    pub futures: Vec<VenueJob>,
}

pub struct UpdaterScheduler {
    config: SchedulerConfig,
    pool: PgPool,
    jobs: JobSet,
}

impl UpdaterScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig, pool: PgPool, jobs: JobSet) -> Self {
        Self { config, pool, jobs }
    }

    /// Registers every job and starts the scheduler. The returned handle is
    /// kept by the caller for shutdown.
    ///
    /// # Errors
    /// Returns an error if the scheduler cannot be constructed or a job
    /// cannot be registered; this is fatal at startup.
    pub async fn start(self) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;

        add_venue_jobs(
            &scheduler,
            &self.jobs.spot,
            Duration::from_secs(self.config.spot_period_secs),
            "spot pairs",
            &self.pool,
        )
        .await?;
        add_venue_jobs(
            &scheduler,
            &self.jobs.networks,
            Duration::from_secs(self.config.network_period_secs),
            "networks",
            &self.pool,
        )
        .await?;
        add_venue_jobs(
            &scheduler,
            &self.jobs.futures,
            Duration::from_secs(self.config.futures_period_secs),
            "futures pairs",
            &self.pool,
        )
        .await?;

        // One lock shared by both differential jobs; everything else is
        // free to overlap.
        let diff_lock = Arc::new(Mutex::new(()));
        let diff_period = Duration::from_secs(self.config.diff_period_secs);
        let diffs = DiffsRepository::new(self.pool.clone());

        let spot_diffs = {
            let diffs = diffs.clone();
            let lock = diff_lock.clone();
            Job::new_repeated_async(diff_period, move |_uuid, _scheduler| {
                let diffs = diffs.clone();
                let lock = lock.clone();
                Box::pin(async move {
                    let _guard = lock.lock().await;
                    if let Err(e) = diffs.refresh_spot().await {
                        error!("error executing differential job (updateDiffs): {e:#}");
                    }
                })
            })?
        };
        let spot_diffs_id = scheduler.add(spot_diffs).await?;
        info!("differential job created (updateDiffs) with id {spot_diffs_id}");

        let futures_diffs = {
            let diffs = diffs.clone();
            let lock = diff_lock.clone();
            Job::new_repeated_async(diff_period, move |_uuid, _scheduler| {
                let diffs = diffs.clone();
                let lock = lock.clone();
                Box::pin(async move {
                    let _guard = lock.lock().await;
                    if let Err(e) = diffs.refresh_futures().await {
                        error!("error executing differential job (updateDiffsFutures): {e:#}");
                    }
                })
            })?
        };
        let futures_diffs_id = scheduler.add(futures_diffs).await?;
        info!("differential job created (updateDiffsFutures) with id {futures_diffs_id}");

        scheduler.start().await?;
        info!(
            "scheduler started: {} spot, {} network, {} futures jobs",
            self.jobs.spot.len(),
            self.jobs.networks.len(),
            self.jobs.futures.len()
        );

        Ok(scheduler)
    }
}

async fn add_venue_jobs(
    scheduler: &JobScheduler,
    jobs: &[VenueJob],
    period: Duration,
    kind: &'static str,
    pool: &PgPool,
) -> Result<()> {
    for job in jobs {
        let venue = job.venue;
        let run = job.run.clone();
        let pool = pool.clone();
        let scheduled = Job::new_repeated_async(period, move |_uuid, _scheduler| {
            let run = run.clone();
            let pool = pool.clone();
            Box::pin(async move {
                if let Err(e) = run(pool).await {
                    error!("{venue} error updating {kind}: {e:#}");
                }
            })
        })?;
        scheduler.add(scheduled).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_job_wraps_async_fn() {
        let job = VenueJob::new("Binance", |_pool: PgPool| async { Ok(()) });
        assert_eq!(job.venue, "Binance");
    }

    #[test]
    fn test_job_set_default_is_empty() {
        let jobs = JobSet::default();
        assert!(jobs.spot.is_empty());
        assert!(jobs.networks.is_empty());
        assert!(jobs.futures.is_empty());
    }
}
