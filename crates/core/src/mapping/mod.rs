//! Normalization of raw provider items into [`UnifiedEvent`]s
//!
//! Pure functions shared by the provider adapters. Date-like text is
//! validated here: a missing value falls back to a default, a malformed one
//! is a mapping error and the item is skipped by the orchestrator.

pub mod google;
pub mod notion;

use calsync_domain::{CalSyncError, RawProviderItem, Result, UnifiedEvent};
use chrono::{DateTime, NaiveDate, Utc};

pub use google::{google_to_unified, LOCAL_ID_PROPERTY, NOTES_PROPERTY};
pub use notion::{notion_to_unified, NotionFieldCandidates, NOTION_FIELDS};

/// Map any raw item with the mapper for its provider.
pub fn to_unified(item: &RawProviderItem, now: DateTime<Utc>) -> Result<UnifiedEvent> {
    match item {
        RawProviderItem::Google(event) => google_to_unified(event, now),
        RawProviderItem::Notion(page) => notion_to_unified(page, now),
    }
}

/// A parsed boundary: the instant, and whether it came from a bare date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Boundary {
    pub at: DateTime<Utc>,
    pub date_only: bool,
}

/// Parse an RFC 3339 timestamp.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| CalSyncError::InvalidInput(format!("invalid {field} timestamp {value:?}: {e}")))
}

/// Parse a `YYYY-MM-DD` date as midnight UTC.
pub(crate) fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| CalSyncError::InvalidInput(format!("invalid {field} date {value:?}")))
}

/// Parse either a bare date or a full timestamp.
pub(crate) fn parse_date_or_timestamp(field: &str, value: &str) -> Result<Boundary> {
    let trimmed = value.trim();
    if trimmed.len() == 10 {
        return parse_date(field, trimmed).map(|at| Boundary { at, date_only: true });
    }
    parse_timestamp(field, trimmed).map(|at| Boundary { at, date_only: false })
}
