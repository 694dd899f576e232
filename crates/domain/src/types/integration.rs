//! Calendar integrations and their provider capabilities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// External calendar provider backing an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Calendar: push notifications and polling.
    Google,
    /// Notion database: polling only.
    Notion,
}

impl_status_conversions!(ProviderKind {
    Google => "google",
    Notion => "notion",
});

/// What a provider adapter is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub supports_push: bool,
    pub supports_poll: bool,
}

impl ProviderCapabilities {
    pub const PUSH_AND_POLL: Self = Self { supports_push: true, supports_poll: true };
    pub const POLL_ONLY: Self = Self { supports_push: false, supports_poll: true };
}

/// Active push channel for an integration.
///
/// Only the hash of the channel token is kept; the token itself is handed to
/// the provider and echoed back on every delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub channel_id: String,
    pub resource_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_hash: Option<String>,
}

/// One authorized link between the local store and an external calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarIntegration {
    pub id: String,
    pub provider: ProviderKind,
    /// Remote calendar id (Google) or database id (Notion).
    pub external_id: String,
    pub encrypted_access_token: String,
    pub encrypted_refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub webhook: Option<WebhookChannel>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarIntegration {
    /// True when the access token expires within `skew` of `now`.
    pub fn token_needs_refresh(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.token_expires_at.is_some_and(|expires_at| expires_at <= now + skew)
    }

    /// Webhook channel id, if a channel is currently registered.
    pub fn webhook_id(&self) -> Option<&str> {
        self.webhook.as_ref().map(|channel| channel.channel_id.as_str())
    }

    /// Public, secret-free view of this integration.
    pub fn status(&self) -> IntegrationStatus {
        IntegrationStatus {
            id: self.id.clone(),
            provider: self.provider,
            external_id: self.external_id.clone(),
            is_active: self.is_active,
            last_sync_at: self.last_sync_at,
            last_sync_error: self.last_sync_error.clone(),
            webhook_id: self.webhook.as_ref().map(|channel| channel.channel_id.clone()),
            webhook_expiry: self.webhook.as_ref().map(|channel| channel.expires_at),
        }
    }
}

/// Integration fields that are safe to return over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    pub id: String,
    pub provider: ProviderKind,
    pub external_id: String,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub webhook_id: Option<String>,
    pub webhook_expiry: Option<DateTime<Utc>>,
}

/// Parameters for persisting a freshly authorized integration.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub id: String,
    pub provider: ProviderKind,
    pub external_id: String,
    pub encrypted_access_token: String,
    pub encrypted_refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Re-encrypted credentials written back after a token refresh.
#[derive(Debug, Clone)]
pub struct StoredTokens {
    pub encrypted_access_token: String,
    /// `None` keeps the currently stored refresh token.
    pub encrypted_refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}
