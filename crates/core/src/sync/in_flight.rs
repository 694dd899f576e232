//! Per-integration pass exclusion with rerun coalescing

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Integrations with a pass in flight, each with a pending-rerun flag.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    passes: Arc<Mutex<HashMap<String, bool>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the integration, or record that another pass was requested
    /// while one is running.
    pub fn try_acquire(&self, integration_id: &str) -> Option<InFlightGuard> {
        let mut passes = self.passes.lock();
        match passes.get_mut(integration_id) {
            Some(rerun) => {
                *rerun = true;
                None
            }
            None => {
                passes.insert(integration_id.to_string(), false);
                Some(InFlightGuard {
                    passes: Arc::clone(&self.passes),
                    integration_id: integration_id.to_string(),
                    released: false,
                })
            }
        }
    }

    pub fn is_running(&self, integration_id: &str) -> bool {
        self.passes.lock().contains_key(integration_id)
    }
}

/// Held for the duration of a pass; releases the integration on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    passes: Arc<Mutex<HashMap<String, bool>>>,
    integration_id: String,
    released: bool,
}

impl InFlightGuard {
    /// Consume a pending rerun request. Returns `true` when the holder must
    /// run another pass; the claim is kept in that case. Otherwise the claim
    /// is released under the same lock, so no trigger can slip in between
    /// the check and the release.
    pub fn take_rerun(&mut self) -> bool {
        if self.released {
            return false;
        }
        let mut passes = self.passes.lock();
        match passes.get_mut(&self.integration_id) {
            Some(rerun) if *rerun => {
                *rerun = false;
                true
            }
            _ => {
                passes.remove(&self.integration_id);
                self.released = true;
                false
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            self.passes.lock().remove(&self.integration_id);
        }
    }
}
