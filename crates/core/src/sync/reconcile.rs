//! Application of one remote item to the local store and the ledger

use std::sync::Arc;

use calsync_domain::{CalendarIntegration, Event, EventSync, LedgerUpsert, Result, UnifiedEvent};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::conflict::{resolve, Resolution};
use crate::ports::{EventRepository, LedgerRepository};

/// What happened to one remote item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Remote content was written locally.
    Applied { resolution: Resolution, created: bool },
    /// This remote version was already reconciled.
    Unchanged,
}

/// Local counterpart found for a remote item.
struct Match {
    event: Option<Event>,
    event_id: String,
    row: Option<EventSync>,
}

/// Writes remote changes through the event store and the ledger.
pub struct Reconciler {
    events: Arc<dyn EventRepository>,
    ledger: Arc<dyn LedgerRepository>,
}

impl Reconciler {
    pub fn new(events: Arc<dyn EventRepository>, ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { events, ledger }
    }

    /// Apply `item` with remote-wins semantics.
    ///
    /// Store errors are returned to the caller; they abort the pass.
    pub async fn apply(
        &self,
        integration: &CalendarIntegration,
        item: &UnifiedEvent,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome> {
        let Match { event, event_id, row } = self.locate(integration, item).await?;
        let fingerprint = item.content_fingerprint();

        if row.as_ref().is_some_and(|row| row.has_seen_remote(item.remote_modified_at, &fingerprint)) {
            debug!(external_id = %item.external_id, event_id = %event_id, "remote version already applied");
            return Ok(ApplyOutcome::Unchanged);
        }

        let created = event.is_none();
        let (event, resolution) = match event {
            Some(mut existing) => {
                let resolution = resolve(
                    existing.updated_at,
                    item.remote_modified_at,
                    row.as_ref().and_then(|row| row.last_sync_at),
                );
                existing.overwrite_from(item, now);
                (existing, resolution)
            }
            None => (Event::from_unified(event_id, item, now), Resolution::Clean),
        };

        self.events.save(&event).await?;
        self.ledger
            .upsert(&LedgerUpsert {
                event_id: event.id.clone(),
                integration_id: integration.id.clone(),
                external_id: Some(item.external_id.clone()),
                provider: integration.provider,
                status: resolution.sync_status(),
                local_version: Some(now),
                remote_version: Some(item.remote_modified_at),
                remote_fingerprint: Some(fingerprint),
                last_sync_at: Some(now),
                last_error: None,
            })
            .await?;

        debug!(
            external_id = %item.external_id,
            event_id = %event.id,
            created,
            conflict = resolution.is_conflict(),
            "remote item applied"
        );
        Ok(ApplyOutcome::Applied { resolution, created })
    }

    /// Lookup order: a ledger row for this external id, then a local event
    /// named by the embedded hint or the encoded id, else a new event.
    async fn locate(&self, integration: &CalendarIntegration, item: &UnifiedEvent) -> Result<Match> {
        if let Some(row) = self.ledger.find_by_external_id(&integration.id, &item.external_id).await? {
            let event = self.events.get(&row.event_id).await?;
            return Ok(Match { event, event_id: row.event_id.clone(), row: Some(row) });
        }

        let encoded = item.encoded_local_id();
        let candidates = item.local_event_hint.iter().map(String::as_str).chain([encoded.as_str()]);
        for candidate in candidates {
            if let Some(event) = self.events.get(candidate).await? {
                let row = self.ledger.get(&event.id, &integration.id).await?;
                return Ok(Match { event_id: event.id.clone(), event: Some(event), row });
            }
        }

        Ok(Match { event: None, event_id: encoded, row: None })
    }
}
