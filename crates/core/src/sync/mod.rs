//! Inbound reconciliation, outbound push and batch triggering

pub mod batch;
pub mod credentials;
pub mod in_flight;
pub mod orchestrator;
pub mod push;
pub mod reconcile;

use calsync_domain::{CalSyncError, CalendarIntegration, Result};

pub use batch::{BatchSync, BatchSyncConfig, BatchSyncError, BatchSyncReportExt};
pub use credentials::{map_vault_error, CredentialResolver};
pub use in_flight::{InFlightGuard, InFlightRegistry};
pub use orchestrator::SyncOrchestrator;
pub use push::PushService;
pub use reconcile::{ApplyOutcome, Reconciler};

use crate::ports::IntegrationRepository;

/// Integration by id; `NotFound` when missing, `InvalidInput` when inactive.
pub(crate) async fn load_active_integration(
    integrations: &dyn IntegrationRepository,
    integration_id: &str,
) -> Result<CalendarIntegration> {
    let integration = integrations
        .get(integration_id)
        .await?
        .ok_or_else(|| CalSyncError::NotFound(format!("integration {integration_id}")))?;

    if !integration.is_active {
        return Err(CalSyncError::InvalidInput(format!(
            "integration {integration_id} is inactive"
        )));
    }
    Ok(integration)
}
