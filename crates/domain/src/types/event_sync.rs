//! Reconciliation ledger rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::integration::ProviderKind;
use crate::impl_status_conversions;

/// Reconciliation state of one (event, integration) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Conflict,
    Error,
}

impl_status_conversions!(SyncStatus {
    Pending => "PENDING",
    Synced => "SYNCED",
    Conflict => "CONFLICT",
    Error => "ERROR",
});

/// Ledger entry binding one local event to one integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSync {
    pub event_id: String,
    pub integration_id: String,
    /// Remote item id; absent while an outbound create is still pending.
    pub external_id: Option<String>,
    pub provider: ProviderKind,
    pub sync_status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub local_version: Option<DateTime<Utc>>,
    pub remote_version: Option<DateTime<Utc>>,
    /// Content fingerprint of the remote version last applied.
    pub remote_fingerprint: Option<String>,
    pub last_error: Option<String>,
}

impl EventSync {
    /// True when this remote version has already been reconciled. An equal
    /// modification time only counts as seen when the content matches too,
    /// since some providers stamp edits with a coarse clock.
    pub fn has_seen_remote(&self, remote_modified_at: DateTime<Utc>, fingerprint: &str) -> bool {
        match self.remote_version {
            Some(seen) if remote_modified_at < seen => true,
            Some(seen) if remote_modified_at == seen => {
                self.remote_fingerprint.as_deref().map_or(true, |known| known == fingerprint)
            }
            _ => false,
        }
    }
}

/// Arguments of the idempotent ledger upsert, keyed by
/// `(event_id, integration_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpsert {
    pub event_id: String,
    pub integration_id: String,
    pub external_id: Option<String>,
    pub provider: ProviderKind,
    pub status: SyncStatus,
    pub local_version: Option<DateTime<Utc>>,
    pub remote_version: Option<DateTime<Utc>>,
    pub remote_fingerprint: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
