//! Conflict detection between the local and remote copy of an event.
//!
//! Policy is whole-event last-write-wins by the remote side: the remote copy
//! is always applied, and a conflict only changes the recorded status.

use calsync_domain::SyncStatus;
use chrono::{DateTime, Utc};

/// How an incoming remote change relates to the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Only one side changed since the last reconciliation, or this is the
    /// first one.
    Clean,
    /// Both sides changed since the last reconciliation.
    Conflict,
}

impl Resolution {
    pub fn is_conflict(self) -> bool {
        self == Self::Conflict
    }

    /// Ledger status recorded after applying the remote copy.
    pub fn sync_status(self) -> SyncStatus {
        match self {
            Self::Clean => SyncStatus::Synced,
            Self::Conflict => SyncStatus::Conflict,
        }
    }
}

/// Classify a remote change.
///
/// `last_sync_at == None` means the pair was never reconciled, so there is
/// nothing to conflict with.
pub fn resolve(
    local_modified_at: DateTime<Utc>,
    remote_modified_at: DateTime<Utc>,
    last_sync_at: Option<DateTime<Utc>>,
) -> Resolution {
    match last_sync_at {
        Some(last) if local_modified_at > last && remote_modified_at > last => {
            Resolution::Conflict
        }
        _ => Resolution::Clean,
    }
}
