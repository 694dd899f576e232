//! Sync-all batches over every active integration

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use calsync_domain::{
    BatchSyncReport, IntegrationOutcome, OutcomeStatus, Result, SyncOptions, SyncRun,
};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::orchestrator::SyncOrchestrator;

/// Limits applied to every batch.
#[derive(Debug, Clone)]
pub struct BatchSyncConfig {
    pub max_concurrent_passes: usize,
    pub pass_timeout: Duration,
}

impl Default for BatchSyncConfig {
    fn default() -> Self {
        Self { max_concurrent_passes: 4, pass_timeout: Duration::from_secs(120) }
    }
}

/// At least one integration in the batch failed.
#[derive(Debug, Clone, Error)]
#[error("{} of {} integrations failed to sync: {}", .failures.len(), .report.total, describe(.failures))]
pub struct BatchSyncError {
    pub failures: Vec<IntegrationOutcome>,
    pub report: BatchSyncReport,
}

impl BatchSyncError {
    /// Reason recorded for the first failure, in completion order.
    pub fn first_cause(&self) -> Option<&str> {
        self.failures.first().and_then(|outcome| outcome.error.as_deref())
    }
}

fn describe(failures: &[IntegrationOutcome]) -> String {
    failures
        .iter()
        .map(|outcome| {
            format!("{}: {}", outcome.integration_id, outcome.error.as_deref().unwrap_or("unknown"))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turns a batch report into an error when anything failed.
pub trait BatchSyncReportExt {
    fn into_result(self) -> std::result::Result<BatchSyncReport, BatchSyncError>;
}

impl BatchSyncReportExt for BatchSyncReport {
    fn into_result(self) -> std::result::Result<BatchSyncReport, BatchSyncError> {
        let failures: Vec<_> = self.failures().cloned().collect();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(BatchSyncError { failures, report: self })
        }
    }
}

/// Deregisters a batch's cancellation token however the batch ends.
struct ActiveBatch<'a> {
    active: &'a Mutex<HashMap<Uuid, CancellationToken>>,
    batch_id: Uuid,
}

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.batch_id);
    }
}

/// Runs passes for all active integrations concurrently, isolating failures.
pub struct BatchSync {
    orchestrator: Arc<SyncOrchestrator>,
    config: BatchSyncConfig,
    active: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl BatchSync {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: BatchSyncConfig) -> Self {
        Self { orchestrator, config, active: Mutex::new(HashMap::new()) }
    }

    /// Run a batch that [`cancel_all`](Self::cancel_all) can cancel.
    pub async fn run(&self) -> Result<BatchSyncReport> {
        let (_active, cancel) = self.register();
        self.sync_all(cancel).await
    }

    /// Run a batch, cancelling it once `budget` has elapsed. Passes already
    /// started are awaited so their outcomes still land in the report.
    pub async fn run_within(&self, budget: Duration) -> Result<BatchSyncReport> {
        let (_active, cancel) = self.register();
        let batch = self.sync_all(cancel.clone());
        tokio::pin!(batch);

        tokio::select! {
            report = &mut batch => report,
            () = tokio::time::sleep(budget) => {
                warn!(budget_secs = budget.as_secs(), "sync-all budget exhausted; cancelling remaining passes");
                cancel.cancel();
                batch.await
            }
        }
    }

    fn register(&self) -> (ActiveBatch<'_>, CancellationToken) {
        let batch_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.active.lock().insert(batch_id, cancel.clone());
        (ActiveBatch { active: &self.active, batch_id }, cancel)
    }

    /// Cancel every running batch. Returns `false` when none was running.
    pub fn cancel_all(&self) -> bool {
        let active = self.active.lock();
        for token in active.values() {
            token.cancel();
        }
        !active.is_empty()
    }

    /// One pass per active integration, at most `max_concurrent_passes` at a
    /// time. Passes not yet started when `cancel` fires are skipped; started
    /// ones run to completion on their own task, even if this future is
    /// dropped.
    #[instrument(skip(self, cancel))]
    pub async fn sync_all(&self, cancel: CancellationToken) -> Result<BatchSyncReport> {
        let started = Instant::now();
        let integrations = self.orchestrator.integrations().list_active().await?;
        let concurrency = self.config.max_concurrent_passes.max(1);

        let outcomes: Vec<IntegrationOutcome> = stream::iter(integrations)
            .map(|integration| {
                let cancel = cancel.clone();
                let orchestrator = Arc::clone(&self.orchestrator);
                let pass_timeout = self.config.pass_timeout;
                async move {
                    if cancel.is_cancelled() {
                        return IntegrationOutcome::without_pass(
                            integration.id,
                            integration.provider,
                            OutcomeStatus::Skipped,
                            None,
                        );
                    }

                    let integration_id = integration.id.clone();
                    let pass = tokio::spawn(async move {
                        orchestrator
                            .run_sync_bounded(&integration_id, SyncOptions::default(), pass_timeout)
                            .await
                    });

                    match pass.await {
                        Ok(Ok(SyncRun::Completed(report))) => IntegrationOutcome::synced(&report),
                        Ok(Ok(SyncRun::Coalesced)) => IntegrationOutcome::without_pass(
                            integration.id,
                            integration.provider,
                            OutcomeStatus::Coalesced,
                            None,
                        ),
                        Ok(Err(err)) => {
                            warn!(integration_id = %integration.id, error = %err, "integration failed in batch");
                            IntegrationOutcome::without_pass(
                                integration.id,
                                integration.provider,
                                OutcomeStatus::Failed,
                                Some(err.summary()),
                            )
                        }
                        Err(join_err) => {
                            error!(integration_id = %integration.id, error = %join_err, "sync pass task failed");
                            IntegrationOutcome::without_pass(
                                integration.id,
                                integration.provider,
                                OutcomeStatus::Failed,
                                Some(format!("sync pass task failed: {join_err}")),
                            )
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let report = BatchSyncReport::from_outcomes(outcomes, cancel.is_cancelled());
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            applied = report.applied,
            conflicts = report.conflicts,
            cancelled = report.cancelled,
            duration_ms = started.elapsed().as_millis() as u64,
            "sync-all batch finished"
        );
        Ok(report)
    }
}
