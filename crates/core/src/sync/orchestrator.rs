//! Reconciliation passes for one integration

use std::sync::Arc;
use std::time::{Duration, Instant};

use calsync_domain::{
    CalSyncError, CalendarIntegration, Result, SyncOptions, SyncReport, SyncRun, UnifiedEvent,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use super::credentials::CredentialResolver;
use super::in_flight::InFlightRegistry;
use super::load_active_integration;
use super::reconcile::{ApplyOutcome, Reconciler};
use crate::ports::{EventRepository, IntegrationRepository, LedgerRepository};
use crate::provider::ProviderRegistry;

/// Drives fetch → resolve → apply for one integration at a time.
pub struct SyncOrchestrator {
    integrations: Arc<dyn IntegrationRepository>,
    providers: Arc<dyn ProviderRegistry>,
    credentials: Arc<CredentialResolver>,
    reconciler: Reconciler,
    in_flight: InFlightRegistry,
}

impl SyncOrchestrator {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        events: Arc<dyn EventRepository>,
        ledger: Arc<dyn LedgerRepository>,
        providers: Arc<dyn ProviderRegistry>,
        credentials: Arc<CredentialResolver>,
    ) -> Self {
        Self {
            integrations,
            providers,
            credentials,
            reconciler: Reconciler::new(events, ledger),
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn integrations(&self) -> &Arc<dyn IntegrationRepository> {
        &self.integrations
    }

    /// True while a pass for `integration_id` is running.
    pub fn is_running(&self, integration_id: &str) -> bool {
        self.in_flight.is_running(integration_id)
    }

    /// Run a pass unless one is already in flight.
    ///
    /// A refused trigger returns [`SyncRun::Coalesced`] and makes the running
    /// pass go around once more with default options when it finishes.
    #[instrument(skip(self, options), fields(integration_id = %integration_id))]
    pub async fn run_sync(&self, integration_id: &str, options: SyncOptions) -> Result<SyncRun> {
        let Some(mut guard) = self.in_flight.try_acquire(integration_id) else {
            warn!("pass already in flight; coalescing trigger into a rerun");
            return Ok(SyncRun::Coalesced);
        };

        // A coalesced trigger is owed a pass even when the current one failed.
        let mut result = self.run_pass(integration_id, &options).await;
        while guard.take_rerun() {
            let next = self.run_pass(integration_id, &SyncOptions::default()).await;
            result = match (result, next) {
                (Ok(mut report), Ok(next)) => {
                    merge_reports(&mut report, next);
                    Ok(report)
                }
                (Err(_), Ok(next)) => Ok(next),
                (previous, Err(err)) => {
                    error!(error = %err, "coalesced rerun failed");
                    previous
                }
            };
        }

        result.map(SyncRun::Completed)
    }

    /// [`run_sync`](Self::run_sync) bounded by `timeout`. An elapsed pass is
    /// dropped, releases its claim and is recorded as a failure.
    pub async fn run_sync_bounded(
        &self,
        integration_id: &str,
        options: SyncOptions,
        timeout: Duration,
    ) -> Result<SyncRun> {
        match tokio::time::timeout(timeout, self.run_sync(integration_id, options)).await {
            Ok(result) => result,
            Err(_) => {
                let err = CalSyncError::Network(format!(
                    "sync pass timed out after {}s",
                    timeout.as_secs()
                ));
                error!(integration_id, error = %err, "sync pass timed out");
                self.integrations.record_sync_failure(integration_id, &err.summary()).await?;
                Err(err)
            }
        }
    }

    async fn run_pass(&self, integration_id: &str, options: &SyncOptions) -> Result<SyncReport> {
        let started = Utc::now();
        let timer = Instant::now();

        let integration = load_active_integration(self.integrations.as_ref(), integration_id).await?;

        match self.execute(&integration, options, started).await {
            Ok(report) => {
                self.integrations.record_sync_success(&integration.id, started).await?;
                info!(
                    provider = %integration.provider,
                    applied = report.applied_count(),
                    conflicts = report.conflict_count(),
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    duration_ms = timer.elapsed().as_millis() as u64,
                    "sync pass completed"
                );
                Ok(report)
            }
            Err(err) => {
                self.record_failure(&integration, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        integration: &CalendarIntegration,
        options: &SyncOptions,
        started: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let adapter = self.providers.adapter(integration.provider)?;
        let access_token =
            self.credentials.access_token(integration, adapter.as_ref(), started).await?;

        let calendar_id =
            options.external_id_override.as_deref().unwrap_or(&integration.external_id);
        let since = integration.last_sync_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let raw_items = adapter.list_changes(&access_token, calendar_id, since).await?;

        let mut skipped = 0;
        let mut items: Vec<UnifiedEvent> = Vec::with_capacity(raw_items.len());
        for raw in &raw_items {
            match adapter.to_unified_event(raw) {
                Ok(item) => items.push(item),
                Err(err) => {
                    skipped += 1;
                    warn!(external_id = raw.external_id(), error = %err, "skipping unmappable item");
                }
            }
        }
        items.sort_by_key(|item| item.remote_modified_at);

        let mut report = SyncReport {
            integration_id: integration.id.clone(),
            provider: integration.provider,
            applied: Vec::new(),
            conflicts: Vec::new(),
            unchanged: 0,
            skipped,
            synced_at: started,
        };

        for item in items {
            match self.reconciler.apply(integration, &item, Utc::now()).await? {
                ApplyOutcome::Applied { resolution, .. } => {
                    if resolution.is_conflict() {
                        warn!(external_id = %item.external_id, "conflict recorded; remote copy kept");
                        report.conflicts.push(item.clone());
                    }
                    report.applied.push(item);
                }
                ApplyOutcome::Unchanged => report.unchanged += 1,
            }
        }

        Ok(report)
    }

    async fn record_failure(&self, integration: &CalendarIntegration, err: &CalSyncError) {
        let summary = err.summary();
        let recorded = if err.deactivates_integration() {
            error!(integration_id = %integration.id, error = %err, "credentials revoked; deactivating integration");
            self.integrations.deactivate(&integration.id, &summary).await
        } else {
            error!(integration_id = %integration.id, error = %err, "sync pass failed");
            self.integrations.record_sync_failure(&integration.id, &summary).await
        };

        if let Err(store_err) = recorded {
            error!(integration_id = %integration.id, error = %store_err, "failed to record sync failure");
        }
    }
}

fn merge_reports(into: &mut SyncReport, next: SyncReport) {
    into.applied.extend(next.applied);
    into.conflicts.extend(next.conflicts);
    into.unchanged += next.unchanged;
    into.skipped += next.skipped;
    into.synced_at = next.synced_at;
}
