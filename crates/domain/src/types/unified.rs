//! Provider-agnostic event shape every adapter normalizes into

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::integration::ProviderKind;

/// Title used when a remote item has no usable title.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Duration reported for items whose end is missing or not after the start.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

/// Normalized remote event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEvent {
    pub external_id: String,
    pub provider: ProviderKind,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "startDateTime")]
    pub start: DateTime<Utc>,
    #[serde(rename = "endDateTime")]
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub all_day: bool,
    pub multi_day: bool,
    /// Minutes between start and end, never below one hour when non-positive.
    pub duration: i64,
    pub remote_modified_at: DateTime<Utc>,
    /// Local event id embedded in the remote item by an earlier push.
    pub local_event_hint: Option<String>,
}

impl UnifiedEvent {
    /// Identifier a local event receives when first created from this item.
    pub fn encoded_local_id(&self) -> String {
        encode_local_id(self.provider, &self.external_id)
    }

    /// SHA-256 over the content fields. Tells two versions apart when the
    /// provider stamps both with the same modification time.
    pub fn content_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.location.as_deref(),
            self.notes.as_deref(),
        ] {
            match field {
                Some(text) => {
                    hasher.update([1u8]);
                    hasher.update((text.len() as u64).to_le_bytes());
                    hasher.update(text.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
        hasher.update(self.start.timestamp_millis().to_le_bytes());
        hasher.update(self.end.timestamp_millis().to_le_bytes());
        hasher.update([u8::from(self.all_day)]);
        hex::encode(hasher.finalize())
    }
}

/// `"{provider}_{external_id}"`, the id convention for remotely-created events.
pub fn encode_local_id(provider: ProviderKind, external_id: &str) -> String {
    format!("{provider}_{external_id}")
}

/// Partially-extracted fields; `finish` applies the shared defaults.
#[derive(Debug, Clone, Default)]
pub struct UnifiedEventDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub all_day: bool,
    /// Google encodes all-day ranges with an exclusive end date.
    pub all_day_end_exclusive: bool,
    pub remote_modified_at: Option<DateTime<Utc>>,
    pub local_event_hint: Option<String>,
}

impl UnifiedEventDraft {
    /// Apply defaults: blank title, missing dates, non-positive durations.
    pub fn finish(
        self,
        provider: ProviderKind,
        external_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> UnifiedEvent {
        let title = self
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNTITLED_EVENT.to_string());

        let start = self.start.unwrap_or(now);
        let end = self.end.unwrap_or(start);

        let minutes = (end - start).num_minutes();
        let duration = if minutes > 0 { minutes } else { DEFAULT_DURATION_MINUTES };

        let multi_day = if self.all_day && self.all_day_end_exclusive {
            end - start > Duration::days(1)
        } else {
            end.date_naive() > start.date_naive()
        };

        UnifiedEvent {
            external_id: external_id.into(),
            provider,
            title,
            description: non_blank(self.description),
            start,
            end,
            location: non_blank(self.location),
            notes: non_blank(self.notes),
            all_day: self.all_day,
            multi_day,
            duration,
            // start is stable across passes, unlike `now`
            remote_modified_at: self.remote_modified_at.unwrap_or(start),
            local_event_hint: non_blank(self.local_event_hint),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
