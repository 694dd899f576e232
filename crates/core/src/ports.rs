//! Port interfaces for persistence and background dispatch

use async_trait::async_trait;
use calsync_domain::{
    CalendarIntegration, Event, EventSync, LedgerUpsert, NewIntegration, Result, StoredTokens,
    SyncRequest, WebhookChannel,
};
use chrono::{DateTime, Utc};

/// Trait for calendar integration persistence
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Persist a newly authorized integration
    async fn insert(&self, integration: &NewIntegration) -> Result<CalendarIntegration>;

    /// Get an integration by id
    async fn get(&self, id: &str) -> Result<Option<CalendarIntegration>>;

    /// All integrations, active or not
    async fn list_all(&self) -> Result<Vec<CalendarIntegration>>;

    /// Integrations eligible for polling and push
    async fn list_active(&self) -> Result<Vec<CalendarIntegration>>;

    /// Active integration owning the given push channel
    async fn find_by_webhook_id(&self, channel_id: &str) -> Result<Option<CalendarIntegration>>;

    /// Active integrations whose channel expires at or before `cutoff`
    async fn list_webhooks_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CalendarIntegration>>;

    /// Set `last_sync_at` and clear `last_sync_error`
    async fn record_sync_success(&self, id: &str, synced_at: DateTime<Utc>) -> Result<()>;

    /// Set `last_sync_error`, leaving `last_sync_at` untouched
    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<()>;

    /// Mark inactive, clear the webhook fields and record `reason`
    async fn deactivate(&self, id: &str, reason: &str) -> Result<()>;

    /// Replace stored credentials after a refresh
    async fn save_tokens(&self, id: &str, tokens: &StoredTokens) -> Result<()>;

    /// Record the active push channel, replacing any previous one
    async fn set_webhook(&self, id: &str, channel: &WebhookChannel) -> Result<()>;

    /// Drop the push channel fields
    async fn clear_webhook(&self, id: &str) -> Result<()>;
}

/// Trait for the local event store
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Event>>;

    /// Insert or overwrite by id
    async fn save(&self, event: &Event) -> Result<()>;
}

/// Trait for the reconciliation ledger
///
/// Every write goes through [`upsert`](LedgerRepository::upsert), keyed by
/// `(event_id, integration_id)`.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Insert or update the row for `(event_id, integration_id)`
    async fn upsert(&self, entry: &LedgerUpsert) -> Result<EventSync>;

    async fn get(&self, event_id: &str, integration_id: &str) -> Result<Option<EventSync>>;

    async fn find_by_external_id(
        &self,
        integration_id: &str,
        external_id: &str,
    ) -> Result<Option<EventSync>>;

    /// Every row for one integration
    async fn list_for_integration(&self, integration_id: &str) -> Result<Vec<EventSync>>;

    /// Delete one row, returning whether it existed
    async fn delete(&self, event_id: &str, integration_id: &str) -> Result<bool>;
}

/// Background dispatch of sync passes
///
/// `enqueue` must not wait for the pass to run.
pub trait SyncQueue: Send + Sync {
    fn enqueue(&self, request: SyncRequest) -> Result<()>;
}
