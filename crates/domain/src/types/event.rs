//! Local, provider-agnostic scheduling records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::unified::UnifiedEvent;

/// Event as owned by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub all_day: bool,
    pub multi_day: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Build a new local event from remote content.
    pub fn from_unified(id: String, unified: &UnifiedEvent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: unified.title.clone(),
            description: unified.description.clone(),
            start_at: unified.start,
            end_at: unified.end,
            location: unified.location.clone(),
            notes: unified.notes.clone(),
            all_day: unified.all_day,
            multi_day: unified.multi_day,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every content field with the remote version.
    pub fn overwrite_from(&mut self, unified: &UnifiedEvent, now: DateTime<Utc>) {
        self.title.clone_from(&unified.title);
        self.description.clone_from(&unified.description);
        self.start_at = unified.start;
        self.end_at = unified.end;
        self.location.clone_from(&unified.location);
        self.notes.clone_from(&unified.notes);
        self.all_day = unified.all_day;
        self.multi_day = unified.multi_day;
        self.updated_at = now;
    }
}

/// Payload sent to a provider when pushing a local event outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    /// Local event id, embedded remotely so later inbound passes can match it.
    pub local_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub all_day: bool,
}

impl From<&Event> for OutboundEvent {
    fn from(event: &Event) -> Self {
        Self {
            local_id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            start: event.start_at,
            end: event.end_at,
            location: event.location.clone(),
            notes: event.notes.clone(),
            all_day: event.all_day,
        }
    }
}
