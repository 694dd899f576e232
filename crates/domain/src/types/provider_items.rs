//! Typed raw payloads returned by provider adapters
//!
//! Each variant holds the provider's item as deserialized from its API, before
//! any field-name fallbacks or defaults are applied. Date-like fields stay as
//! text here; the mapping step validates them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw item listed by a provider, tagged by origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "item", rename_all = "lowercase")]
pub enum RawProviderItem {
    Google(GoogleEventItem),
    Notion(NotionPage),
}

impl RawProviderItem {
    /// Provider-side id of the item.
    pub fn external_id(&self) -> &str {
        match self {
            Self::Google(item) => &item.id,
            Self::Notion(page) => &page.id,
        }
    }
}

/// Google Calendar `Event` resource (subset).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventItem {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<GoogleEventDateTime>,
    #[serde(default)]
    pub end: Option<GoogleEventDateTime>,
    /// RFC 3339 last-modification time.
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub extended_properties: Option<GoogleExtendedProperties>,
}

impl GoogleEventItem {
    /// Cancelled items are deletions, not content changes.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// Either a timed (`dateTime`) or an all-day (`date`) boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Application-private key/value pairs attached to a Google event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleExtendedProperties {
    #[serde(default)]
    pub private: HashMap<String, String>,
}

/// Notion database page (subset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: HashMap<String, NotionProperty>,
}

/// Notion property value, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotionProperty {
    Title {
        #[serde(default)]
        title: Vec<NotionRichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<NotionRichText>,
    },
    Date {
        #[serde(default)]
        date: Option<NotionDate>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    /// Property types the mapper never reads.
    #[serde(other)]
    Unsupported,
}

impl NotionProperty {
    /// Concatenated plain text of a title or rich-text property.
    pub fn plain_text(&self) -> Option<String> {
        let fragments = match self {
            Self::Title { title } => title,
            Self::RichText { rich_text } => rich_text,
            Self::Url { url } => return url.clone(),
            Self::Date { .. } | Self::Unsupported => return None,
        };
        let text: String = fragments.iter().map(|fragment| fragment.plain_text.as_str()).collect();
        Some(text)
    }

    /// Date value of a date property.
    pub fn date(&self) -> Option<&NotionDate> {
        match self {
            Self::Date { date } => date.as_ref(),
            _ => None,
        }
    }
}

/// One rich-text fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionRichText {
    #[serde(default)]
    pub plain_text: String,
}

/// Notion date range; `start` may be a bare date or a full timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionDate {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Access token issued by a provider refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Rotated refresh token, when the provider issues one.
    pub refresh_token: Option<String>,
    pub expires_in_secs: Option<i64>,
}

/// Result of an outbound create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWrite {
    pub external_id: String,
    pub remote_modified_at: chrono::DateTime<chrono::Utc>,
}
