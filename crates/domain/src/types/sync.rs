//! Sync pass requests, per-pass reports and batch aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::integration::ProviderKind;
use super::unified::UnifiedEvent;
use crate::impl_status_conversions;

/// Per-pass overrides supplied by a manual trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Calendar or database id to fetch instead of the stored one. Never
    /// persisted.
    #[serde(default, alias = "databaseOrCalendarId")]
    pub external_id_override: Option<String>,
}

/// What caused a pass to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Webhook,
    Schedule,
    Manual,
}

impl_status_conversions!(SyncTrigger {
    Webhook => "webhook",
    Schedule => "schedule",
    Manual => "manual",
});

/// Work item handed to the background sync queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub integration_id: String,
    pub trigger: SyncTrigger,
}

impl SyncRequest {
    pub fn new(integration_id: impl Into<String>, trigger: SyncTrigger) -> Self {
        Self { integration_id: integration_id.into(), trigger }
    }
}

/// Result of one completed reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub integration_id: String,
    pub provider: ProviderKind,
    /// Every remote item written to the local store, conflicts included.
    pub applied: Vec<UnifiedEvent>,
    /// Subset of `applied` that was recorded as a conflict.
    pub conflicts: Vec<UnifiedEvent>,
    /// Items already reconciled at their current remote version.
    pub unchanged: usize,
    /// Items that failed to map or apply.
    pub skipped: usize,
    pub synced_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Outcome of asking the orchestrator to run a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    Completed(SyncReport),
    /// Another pass was in flight; it will run again once it finishes.
    Coalesced,
}

impl SyncRun {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Coalesced => None,
        }
    }
}

/// Per-integration status inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Synced,
    Coalesced,
    Failed,
    /// Batch was cancelled before this pass started.
    Skipped,
}

impl_status_conversions!(OutcomeStatus {
    Synced => "synced",
    Coalesced => "coalesced",
    Failed => "failed",
    Skipped => "skipped",
});

/// One line of a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationOutcome {
    pub integration_id: String,
    pub provider: ProviderKind,
    pub status: OutcomeStatus,
    pub applied: usize,
    pub conflicts: usize,
    pub error: Option<String>,
}

impl IntegrationOutcome {
    pub fn synced(report: &SyncReport) -> Self {
        Self {
            integration_id: report.integration_id.clone(),
            provider: report.provider,
            status: OutcomeStatus::Synced,
            applied: report.applied_count(),
            conflicts: report.conflict_count(),
            error: None,
        }
    }

    pub fn without_pass(
        integration_id: impl Into<String>,
        provider: ProviderKind,
        status: OutcomeStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            integration_id: integration_id.into(),
            provider,
            status,
            applied: 0,
            conflicts: 0,
            error,
        }
    }
}

/// Aggregate result of a sync-all batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncReport {
    pub outcomes: Vec<IntegrationOutcome>,
    pub total: usize,
    pub succeeded: usize,
    pub coalesced: usize,
    pub failed: usize,
    pub skipped: usize,
    pub applied: usize,
    pub conflicts: usize,
    pub cancelled: bool,
}

impl BatchSyncReport {
    /// Build the aggregate counters from per-integration outcomes.
    pub fn from_outcomes(outcomes: Vec<IntegrationOutcome>, cancelled: bool) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            total: outcomes.len(),
            succeeded: count(OutcomeStatus::Synced),
            coalesced: count(OutcomeStatus::Coalesced),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
            applied: outcomes.iter().map(|o| o.applied).sum(),
            conflicts: outcomes.iter().map(|o| o.conflicts).sum(),
            cancelled,
            outcomes,
        }
    }

    /// Failed outcomes, in completion order.
    pub fn failures(&self) -> impl Iterator<Item = &IntegrationOutcome> {
        self.outcomes.iter().filter(|o| o.status == OutcomeStatus::Failed)
    }
}

/// Result of pushing local changes to one integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub integration_id: String,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<PushFailure>,
}

/// Event that could not be pushed; its ledger row is marked `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFailure {
    pub event_id: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, status: OutcomeStatus, applied: usize) -> IntegrationOutcome {
        IntegrationOutcome {
            integration_id: id.into(),
            provider: ProviderKind::Notion,
            status,
            applied,
            conflicts: 0,
            error: (status == OutcomeStatus::Failed).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn batch_report_aggregates_counts() {
        let report = BatchSyncReport::from_outcomes(
            vec![
                outcome("a", OutcomeStatus::Synced, 3),
                outcome("b", OutcomeStatus::Failed, 0),
                outcome("c", OutcomeStatus::Skipped, 0),
                outcome("d", OutcomeStatus::Synced, 2),
            ],
            true,
        );

        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.applied, 5);
        assert!(report.cancelled);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn options_accept_endpoint_field_name() {
        let options: SyncOptions =
            serde_json::from_str(r#"{"databaseOrCalendarId":"db-2"}"#).unwrap();
        assert_eq!(options.external_id_override.as_deref(), Some("db-2"));
    }
}
