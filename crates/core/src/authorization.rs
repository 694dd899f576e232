//! Short-lived states handed out before an external authorization flow

use calsync_common::collections::ExpiringStore;
use calsync_domain::{CalSyncError, ProviderKind, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, warn};

const STATE_BYTES: usize = 24;

/// State issued to a client starting an authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationState {
    pub state: String,
    pub provider: ProviderKind,
    pub expires_at: DateTime<Utc>,
}

/// One-shot states indexed by expiry.
#[derive(Debug)]
pub struct AuthorizationStates {
    store: Mutex<ExpiringStore<ProviderKind>>,
}

impl AuthorizationStates {
    pub fn new(ttl: Duration) -> Self {
        Self { store: Mutex::new(ExpiringStore::new(ttl)) }
    }

    pub fn issue(&self, provider: ProviderKind, now: DateTime<Utc>) -> AuthorizationState {
        let mut bytes = [0u8; STATE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = hex::encode(bytes);

        let expires_at = self.store.lock().put_at(state.clone(), provider, now);
        debug!(provider = %provider, %expires_at, "authorization state issued");
        AuthorizationState { state, provider, expires_at }
    }

    /// Accept `state` once, for the provider it was issued for. The state is
    /// consumed even when the provider does not match.
    pub fn validate_and_consume(
        &self,
        state: &str,
        provider: ProviderKind,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self.store.lock().validate_and_consume(state, now) {
            Some(issued_for) if issued_for == provider => Ok(()),
            Some(issued_for) => {
                warn!(expected = %issued_for, got = %provider, "authorization state used for another provider");
                Err(CalSyncError::Auth("authorization state does not match provider".into()))
            }
            None => Err(CalSyncError::Auth("unknown or expired authorization state".into())),
        }
    }

    /// Drop expired states, returning how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.store.lock().sweep(now)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}
