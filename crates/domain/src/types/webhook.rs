//! Push-channel registration and notification types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameters handed to a push-capable adapter when opening a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    pub channel_id: String,
    pub callback_url: String,
    /// Opaque token echoed back by the provider on every delivery.
    pub channel_token: String,
    pub ttl: std::time::Duration,
}

/// Channel confirmed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    pub channel_id: String,
    pub resource_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Resource state carried by a push delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Initial handshake after registration; nothing changed.
    Sync,
    /// Something changed; the delivery itself carries no payload.
    Exists,
    /// Any other state the provider may send.
    Other(String),
}

impl ResourceState {
    /// Parse the header value; matching ignores ASCII case.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("sync") {
            Self::Sync
        } else if trimmed.eq_ignore_ascii_case("exists") {
            Self::Exists
        } else {
            Self::Other(trimmed.to_string())
        }
    }
}

/// Validated push delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub channel_id: String,
    pub resource_state: ResourceState,
    pub channel_token: Option<String>,
    pub resource_id: Option<String>,
}

/// What the ingress did with a delivery. The HTTP response is the same in
/// every case; the disposition is for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "disposition", content = "reason")]
pub enum NotificationOutcome {
    /// `sync` handshake for a known channel.
    Verified,
    /// `exists` for a known channel; a pass was queued.
    SyncQueued,
    /// Delivery dropped without side effects.
    Ignored(IgnoreReason),
}

/// Why a delivery was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    UnknownChannel,
    TokenMismatch,
    UnhandledState,
    QueueUnavailable,
}
