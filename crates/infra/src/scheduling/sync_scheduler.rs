//! Cron scheduler for background sync maintenance.
//!
//! Registers up to three jobs on one `JobScheduler`: the periodic sync-all
//! batch, push channel renewal and the authorization state sweep. Join
//! handles are tracked, cancellation is explicit and every lifecycle call is
//! wrapped in a timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use calsync_core::{AuthorizationStates, BatchSync, WebhookService};
use calsync_domain::{Result, SyncConfig};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Whether the sync-all job is registered at all.
    pub sync_enabled: bool,
    pub sync_cron: String,
    pub renew_cron: String,
    pub sweep_cron: String,
    /// Timeout applied to one job execution. For sync-all this is the budget
    /// after which remaining passes are cancelled.
    pub job_timeout: Duration,
    /// Upper bound of one sync pass; a cancelled batch waits this long for
    /// its started passes.
    pub pass_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl SyncSchedulerConfig {
    pub fn from_sync_config(sync: &SyncConfig) -> Self {
        Self {
            sync_enabled: sync.enabled,
            sync_cron: sync.cron_expression.clone(),
            renew_cron: sync.renew_cron.clone(),
            sweep_cron: sync.sweep_cron.clone(),
            // a batch runs passes in waves, each bounded by the pass timeout
            job_timeout: sync.pass_timeout() * 4,
            pass_timeout: sync.pass_timeout(),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Services the scheduled jobs drive.
#[derive(Clone)]
pub struct SchedulerJobs {
    pub batch: Arc<BatchSync>,
    pub webhooks: Arc<WebhookService>,
    pub authorization_states: Arc<AuthorizationStates>,
}

/// Cron scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    jobs: SchedulerJobs,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl SyncScheduler {
    pub fn new(config: SyncSchedulerConfig, jobs: SchedulerJobs) -> Self {
        Self {
            scheduler: None,
            config,
            jobs,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("sync scheduler monitor cancelled");
        }));

        info!(
            sync_enabled = self.config.sync_enabled,
            sync_cron = %self.config.sync_cron,
            "sync scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    ///
    /// Running batches are cancelled first so passes that have not started
    /// yet are skipped.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();
        if self.jobs.batch.cancel_all() {
            info!("cancelled running sync-all batch");
        }

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;
        let job_timeout = self.config.job_timeout;

        if self.config.sync_enabled {
            let batch = Arc::clone(&self.jobs.batch);
            // the batch cancels itself at the budget, then drains started passes
            let drain_timeout = job_timeout + self.config.pass_timeout;
            let job = timed_job("sync-all", &self.config.sync_cron, drain_timeout, move || {
                let batch = Arc::clone(&batch);
                async move {
                    let report = batch.run_within(job_timeout).await?;
                    info!(
                        total = report.total,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        coalesced = report.coalesced,
                        skipped = report.skipped,
                        cancelled = report.cancelled,
                        "scheduled sync-all finished"
                    );
                    Ok(())
                }
            })?;
            add_job(&scheduler, "sync-all", &self.config.sync_cron, job).await?;
        } else {
            info!("periodic sync disabled; sync-all job not registered");
        }

        let webhooks = Arc::clone(&self.jobs.webhooks);
        let job = timed_job("webhook-renewal", &self.config.renew_cron, job_timeout, move || {
            let webhooks = Arc::clone(&webhooks);
            async move {
                let report = webhooks.renew_expiring(Utc::now()).await?;
                for (integration_id, error) in &report.failed {
                    warn!(%integration_id, %error, "push channel renewal failed");
                }
                if !report.renewed.is_empty() || !report.failed.is_empty() {
                    info!(
                        renewed = report.renewed.len(),
                        failed = report.failed.len(),
                        "push channel renewal finished"
                    );
                }
                Ok(())
            }
        })?;
        add_job(&scheduler, "webhook-renewal", &self.config.renew_cron, job).await?;

        let states = Arc::clone(&self.jobs.authorization_states);
        let job = timed_job("state-sweep", &self.config.sweep_cron, job_timeout, move || {
            let states = Arc::clone(&states);
            async move {
                let removed = states.sweep(Utc::now());
                if removed > 0 {
                    debug!(removed, "expired authorization states swept");
                }
                Ok(())
            }
        })?;
        add_job(&scheduler, "state-sweep", &self.config.sweep_cron, job).await?;

        Ok(scheduler)
    }
}

/// Cron job running `task` under `timeout`, logging its outcome.
fn timed_job<F, Fut>(
    name: &'static str,
    cron: &str,
    timeout: Duration,
    task: F,
) -> SchedulerResult<Job>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Job::new_async(cron, move |_id, _lock| {
        let fut = task();
        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(())) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    debug!(job = name, elapsed_ms, "job finished");
                }
                Ok(Err(err)) => {
                    error!(job = name, error = %err, "scheduled job failed");
                }
                Err(_) => {
                    warn!(job = name, timeout_secs = timeout.as_secs(), "scheduled job timed out");
                }
            }
        })
    })
    .map_err(|source| SchedulerError::JobRegistrationFailed { job: name, source })
}

async fn add_job(
    scheduler: &JobScheduler,
    name: &'static str,
    cron: &str,
    job: Job,
) -> SchedulerResult<()> {
    let job_id = job.guid();
    scheduler
        .add(job)
        .await
        .map_err(|source| SchedulerError::JobRegistrationFailed { job: name, source })?;
    debug!(job = name, cron, %job_id, "registered scheduled job");
    Ok(())
}
