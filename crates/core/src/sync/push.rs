//! Outbound propagation of local events to an integration

use std::sync::Arc;

use calsync_domain::{
    CalSyncError, CalendarIntegration, Event, EventSync, LedgerUpsert, OutboundEvent, PushFailure,
    PushReport, RemoteWrite, Result, SyncStatus,
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use super::credentials::CredentialResolver;
use super::load_active_integration;
use crate::ports::{EventRepository, IntegrationRepository, LedgerRepository};
use crate::provider::{ProviderAdapter, ProviderRegistry};

enum PushAction {
    Created(RemoteWrite),
    Updated(RemoteWrite),
    Unchanged,
}

/// Links local events to an integration and pushes their changes outward.
pub struct PushService {
    integrations: Arc<dyn IntegrationRepository>,
    events: Arc<dyn EventRepository>,
    ledger: Arc<dyn LedgerRepository>,
    providers: Arc<dyn ProviderRegistry>,
    credentials: Arc<CredentialResolver>,
}

impl PushService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        events: Arc<dyn EventRepository>,
        ledger: Arc<dyn LedgerRepository>,
        providers: Arc<dyn ProviderRegistry>,
        credentials: Arc<CredentialResolver>,
    ) -> Self {
        Self { integrations, events, ledger, providers, credentials }
    }

    /// Mark a local event for creation on the integration. An event that is
    /// already linked keeps its existing row.
    #[instrument(skip(self))]
    pub async fn queue_event(&self, event_id: &str, integration_id: &str) -> Result<EventSync> {
        let integration = load_active_integration(self.integrations.as_ref(), integration_id).await?;
        if self.events.get(event_id).await?.is_none() {
            return Err(CalSyncError::NotFound(format!("event {event_id}")));
        }

        if let Some(existing) = self.ledger.get(event_id, integration_id).await? {
            return Ok(existing);
        }

        self.ledger
            .upsert(&LedgerUpsert {
                event_id: event_id.to_string(),
                integration_id: integration_id.to_string(),
                external_id: None,
                provider: integration.provider,
                status: SyncStatus::Pending,
                local_version: None,
                remote_version: None,
                remote_fingerprint: None,
                last_sync_at: None,
                last_error: None,
            })
            .await
    }

    /// Create remote items for unlinked rows and update linked ones whose
    /// local copy changed since it was last reconciled. A failing event is
    /// marked `ERROR` and the rest continue.
    #[instrument(skip(self))]
    pub async fn push_local_changes(&self, integration_id: &str) -> Result<PushReport> {
        let integration = load_active_integration(self.integrations.as_ref(), integration_id).await?;
        let adapter = self.providers.adapter(integration.provider)?;
        let access_token =
            self.credentials.access_token(&integration, adapter.as_ref(), Utc::now()).await?;

        let mut report =
            PushReport { integration_id: integration_id.to_string(), ..PushReport::default() };

        for row in self.ledger.list_for_integration(integration_id).await? {
            let pushed = self.push_one(&integration, adapter.as_ref(), &access_token, &row).await;
            match pushed {
                Ok((PushAction::Unchanged, _)) => report.unchanged += 1,
                Ok((PushAction::Created(write), event)) => {
                    self.record_success(&integration, &event, &write).await?;
                    report.created += 1;
                }
                Ok((PushAction::Updated(write), event)) => {
                    self.record_success(&integration, &event, &write).await?;
                    report.updated += 1;
                }
                Err(err) => {
                    warn!(event_id = %row.event_id, error = %err, "push failed");
                    self.record_failure(&row, &err).await?;
                    report
                        .failed
                        .push(PushFailure { event_id: row.event_id.clone(), error: err.summary() });
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "push finished"
        );
        Ok(report)
    }

    /// Remove the ledger row binding an event to an integration.
    #[instrument(skip(self))]
    pub async fn unlink(&self, event_id: &str, integration_id: &str) -> Result<()> {
        if self.ledger.delete(event_id, integration_id).await? {
            info!("event unlinked");
            Ok(())
        } else {
            Err(CalSyncError::NotFound(format!(
                "event {event_id} is not linked to integration {integration_id}"
            )))
        }
    }

    async fn push_one(
        &self,
        integration: &CalendarIntegration,
        adapter: &dyn ProviderAdapter,
        access_token: &str,
        row: &EventSync,
    ) -> Result<(PushAction, Event)> {
        let event = self
            .events
            .get(&row.event_id)
            .await?
            .ok_or_else(|| CalSyncError::NotFound(format!("event {}", row.event_id)))?;
        let outbound = OutboundEvent::from(&event);

        let action = match row.external_id.as_deref() {
            None => PushAction::Created(
                adapter.create_event(access_token, &integration.external_id, &outbound).await?,
            ),
            Some(external_id)
                if row.local_version.map_or(true, |version| event.updated_at > version) =>
            {
                PushAction::Updated(
                    adapter
                        .update_event(access_token, &integration.external_id, external_id, &outbound)
                        .await?,
                )
            }
            Some(_) => PushAction::Unchanged,
        };
        Ok((action, event))
    }

    async fn record_success(
        &self,
        integration: &CalendarIntegration,
        event: &Event,
        write: &RemoteWrite,
    ) -> Result<()> {
        self.ledger
            .upsert(&LedgerUpsert {
                event_id: event.id.clone(),
                integration_id: integration.id.clone(),
                external_id: Some(write.external_id.clone()),
                provider: integration.provider,
                status: SyncStatus::Synced,
                local_version: Some(event.updated_at),
                remote_version: Some(write.remote_modified_at),
                remote_fingerprint: None,
                last_sync_at: Some(Utc::now()),
                last_error: None,
            })
            .await
            .map(|_| ())
    }

    async fn record_failure(&self, row: &EventSync, err: &CalSyncError) -> Result<()> {
        self.ledger
            .upsert(&LedgerUpsert {
                event_id: row.event_id.clone(),
                integration_id: row.integration_id.clone(),
                external_id: row.external_id.clone(),
                provider: row.provider,
                status: SyncStatus::Error,
                local_version: row.local_version,
                remote_version: row.remote_version,
                remote_fingerprint: row.remote_fingerprint.clone(),
                last_sync_at: row.last_sync_at,
                last_error: Some(err.summary()),
            })
            .await
            .map(|_| ())
    }
}
