//! Provider adapter port

use std::sync::Arc;

use async_trait::async_trait;
use calsync_domain::{
    CalSyncError, OutboundEvent, ProviderCapabilities, ProviderKind, RawProviderItem, RemoteWrite,
    Result, TokenGrant, UnifiedEvent, WebhookRegistration, WebhookRequest,
};
use chrono::{DateTime, Utc};

/// One external calendar provider.
///
/// Push-only operations default to `Unsupported` so poll-only adapters only
/// implement what they can do.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Remote items modified at or after `since`, oldest first.
    async fn list_changes(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawProviderItem>>;

    /// Normalize one raw item. Errors here skip the item, not the pass.
    fn to_unified_event(&self, item: &RawProviderItem) -> Result<UnifiedEvent>;

    /// Exchange a refresh token for a new access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant>;

    async fn create_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite>;

    async fn update_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        external_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite>;

    /// Open a time-limited push channel. The caller renews it.
    async fn register_webhook(
        &self,
        _access_token: &str,
        _external_calendar_id: &str,
        _request: &WebhookRequest,
    ) -> Result<WebhookRegistration> {
        Err(unsupported(self.kind(), "push notifications"))
    }

    async fn unregister_webhook(
        &self,
        _access_token: &str,
        _channel_id: &str,
        _resource_id: Option<&str>,
    ) -> Result<()> {
        Err(unsupported(self.kind(), "push notifications"))
    }
}

/// Lookup of the adapter serving a provider.
pub trait ProviderRegistry: Send + Sync {
    fn adapter(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>>;
}

/// `Unsupported` error naming the provider and capability.
pub fn unsupported(kind: ProviderKind, capability: &str) -> CalSyncError {
    CalSyncError::Unsupported(format!("{kind} does not support {capability}"))
}
