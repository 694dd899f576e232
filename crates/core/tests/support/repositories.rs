//! In-memory implementations of the core storage ports

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::{EventRepository, IntegrationRepository, LedgerRepository, SyncQueue};
use calsync_domain::{
    CalSyncError, CalendarIntegration, Event, EventSync, LedgerUpsert, NewIntegration,
    Result as DomainResult, StoredTokens, SyncRequest, WebhookChannel,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Default, Clone)]
pub struct MockIntegrationRepository {
    rows: Arc<Mutex<HashMap<String, CalendarIntegration>>>,
}

impl MockIntegrationRepository {
    pub fn put(&self, integration: CalendarIntegration) {
        self.rows.lock().insert(integration.id.clone(), integration);
    }

    pub fn snapshot(&self, id: &str) -> CalendarIntegration {
        self.rows.lock().get(id).cloned().expect("integration seeded")
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut CalendarIntegration)) -> DomainResult<()> {
        let mut rows = self.rows.lock();
        let row = rows.get_mut(id).ok_or_else(|| CalSyncError::NotFound(id.to_string()))?;
        f(row);
        row.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl IntegrationRepository for MockIntegrationRepository {
    async fn insert(&self, new: &NewIntegration) -> DomainResult<CalendarIntegration> {
        let now = Utc::now();
        let integration = CalendarIntegration {
            id: new.id.clone(),
            provider: new.provider,
            external_id: new.external_id.clone(),
            encrypted_access_token: new.encrypted_access_token.clone(),
            encrypted_refresh_token: new.encrypted_refresh_token.clone(),
            token_expires_at: new.token_expires_at,
            webhook: None,
            last_sync_at: None,
            last_sync_error: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.put(integration.clone());
        Ok(integration)
    }

    async fn get(&self, id: &str) -> DomainResult<Option<CalendarIntegration>> {
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn list_all(&self) -> DomainResult<Vec<CalendarIntegration>> {
        let mut all: Vec<_> = self.rows.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_active(&self) -> DomainResult<Vec<CalendarIntegration>> {
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|integration| integration.is_active).collect())
    }

    async fn find_by_webhook_id(
        &self,
        channel_id: &str,
    ) -> DomainResult<Option<CalendarIntegration>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|i| i.is_active && i.webhook_id() == Some(channel_id))
            .cloned())
    }

    async fn list_webhooks_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<Vec<CalendarIntegration>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|i| i.is_active && i.webhook.as_ref().is_some_and(|w| w.expires_at <= cutoff))
            .cloned()
            .collect())
    }

    async fn record_sync_success(&self, id: &str, synced_at: DateTime<Utc>) -> DomainResult<()> {
        self.update(id, |row| {
            row.last_sync_at = Some(synced_at);
            row.last_sync_error = None;
        })
    }

    async fn record_sync_failure(&self, id: &str, error: &str) -> DomainResult<()> {
        self.update(id, |row| row.last_sync_error = Some(error.to_string()))
    }

    async fn deactivate(&self, id: &str, reason: &str) -> DomainResult<()> {
        self.update(id, |row| {
            row.is_active = false;
            row.webhook = None;
            row.last_sync_error = Some(reason.to_string());
        })
    }

    async fn save_tokens(&self, id: &str, tokens: &StoredTokens) -> DomainResult<()> {
        self.update(id, |row| {
            row.encrypted_access_token.clone_from(&tokens.encrypted_access_token);
            if let Some(refresh) = &tokens.encrypted_refresh_token {
                row.encrypted_refresh_token = Some(refresh.clone());
            }
            row.token_expires_at = tokens.token_expires_at;
        })
    }

    async fn set_webhook(&self, id: &str, channel: &WebhookChannel) -> DomainResult<()> {
        self.update(id, |row| row.webhook = Some(channel.clone()))
    }

    async fn clear_webhook(&self, id: &str) -> DomainResult<()> {
        self.update(id, |row| row.webhook = None)
    }
}

#[derive(Default, Clone)]
pub struct MockEventRepository {
    events: Arc<Mutex<HashMap<String, Event>>>,
}

impl MockEventRepository {
    pub fn put(&self, event: Event) {
        self.events.lock().insert(event.id.clone(), event);
    }

    pub fn snapshot(&self, id: &str) -> Option<Event> {
        self.events.lock().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

#[async_trait]
impl EventRepository for MockEventRepository {
    async fn get(&self, id: &str) -> DomainResult<Option<Event>> {
        Ok(self.events.lock().get(id).cloned())
    }

    async fn save(&self, event: &Event) -> DomainResult<()> {
        self.put(event.clone());
        Ok(())
    }
}

/// Ledger keyed by `(event_id, integration_id)` that also enforces external
/// id uniqueness within an integration.
#[derive(Default, Clone)]
pub struct MockLedgerRepository {
    rows: Arc<Mutex<HashMap<(String, String), EventSync>>>,
}

impl MockLedgerRepository {
    pub fn count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn snapshot(&self, event_id: &str, integration_id: &str) -> Option<EventSync> {
        self.rows.lock().get(&(event_id.to_string(), integration_id.to_string())).cloned()
    }
}

#[async_trait]
impl LedgerRepository for MockLedgerRepository {
    async fn upsert(&self, entry: &LedgerUpsert) -> DomainResult<EventSync> {
        let mut rows = self.rows.lock();
        if let Some(external_id) = &entry.external_id {
            let clash = rows.values().any(|row| {
                row.integration_id == entry.integration_id
                    && row.external_id.as_ref() == Some(external_id)
                    && row.event_id != entry.event_id
            });
            if clash {
                return Err(CalSyncError::Database("unique constraint violation".into()));
            }
        }

        let row = EventSync {
            event_id: entry.event_id.clone(),
            integration_id: entry.integration_id.clone(),
            external_id: entry.external_id.clone(),
            provider: entry.provider,
            sync_status: entry.status,
            last_sync_at: entry.last_sync_at,
            local_version: entry.local_version,
            remote_version: entry.remote_version,
            remote_fingerprint: entry.remote_fingerprint.clone(),
            last_error: entry.last_error.clone(),
        };
        rows.insert((entry.event_id.clone(), entry.integration_id.clone()), row.clone());
        Ok(row)
    }

    async fn get(&self, event_id: &str, integration_id: &str) -> DomainResult<Option<EventSync>> {
        Ok(self.snapshot(event_id, integration_id))
    }

    async fn find_by_external_id(
        &self,
        integration_id: &str,
        external_id: &str,
    ) -> DomainResult<Option<EventSync>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|row| {
                row.integration_id == integration_id
                    && row.external_id.as_deref() == Some(external_id)
            })
            .cloned())
    }

    async fn list_for_integration(&self, integration_id: &str) -> DomainResult<Vec<EventSync>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|row| row.integration_id == integration_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        Ok(rows)
    }

    async fn delete(&self, event_id: &str, integration_id: &str) -> DomainResult<bool> {
        Ok(self
            .rows
            .lock()
            .remove(&(event_id.to_string(), integration_id.to_string()))
            .is_some())
    }
}

/// Queue that records requests instead of running them.
#[derive(Default, Clone)]
pub struct RecordingQueue {
    requests: Arc<Mutex<Vec<SyncRequest>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingQueue {
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl SyncQueue for RecordingQueue {
    fn enqueue(&self, request: SyncRequest) -> DomainResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CalSyncError::Internal("sync queue is closed".into()));
        }
        self.requests.lock().push(request);
        Ok(())
    }
}
