//! Notion database page mapping
//!
//! Notion databases have user-defined schemas, so every field is looked up
//! through an ordered list of candidate property names. The first candidate
//! that is present with the expected property type wins.

use calsync_domain::{
    NotionPage, NotionProperty, ProviderKind, Result, UnifiedEvent, UnifiedEventDraft,
};
use chrono::{DateTime, Utc};

use super::{parse_date_or_timestamp, parse_timestamp};

/// Candidate property names per unified field.
#[derive(Debug, Clone, Copy)]
pub struct NotionFieldCandidates {
    pub title: &'static [&'static str],
    pub date: &'static [&'static str],
    pub description: &'static [&'static str],
    pub location: &'static [&'static str],
    pub notes: &'static [&'static str],
    pub local_id: &'static [&'static str],
}

pub const NOTION_FIELDS: NotionFieldCandidates = NotionFieldCandidates {
    title: &["Title", "Name", "title", "name"],
    date: &["Date", "date", "When"],
    description: &["Description", "description"],
    location: &["Location", "location"],
    notes: &["Notes", "notes"],
    local_id: &["Event ID", "event_id"],
};

/// Normalize a Notion database page.
pub fn notion_to_unified(page: &NotionPage, now: DateTime<Utc>) -> Result<UnifiedEvent> {
    let fields = NOTION_FIELDS;

    let (start, end, all_day) = match date_property(page, fields.date) {
        Some(date) => {
            let start = parse_date_or_timestamp("start", &date.start)?;
            let end = date
                .end
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .map(|value| parse_date_or_timestamp("end", value))
                .transpose()?;
            (Some(start.at), end.map(|boundary| boundary.at), start.date_only)
        }
        None => (None, None, false),
    };

    let remote_modified_at = page
        .last_edited_time
        .as_deref()
        .map(|value| parse_timestamp("last_edited_time", value))
        .transpose()?;

    let draft = UnifiedEventDraft {
        title: text_property(page, fields.title),
        description: text_property(page, fields.description),
        start,
        end,
        location: text_property(page, fields.location),
        notes: text_property(page, fields.notes),
        all_day,
        all_day_end_exclusive: false,
        remote_modified_at,
        local_event_hint: text_property(page, fields.local_id),
    };

    Ok(draft.finish(ProviderKind::Notion, page.id.clone(), now))
}

/// First candidate holding non-blank text.
fn text_property(page: &NotionPage, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|name| page.properties.get(*name))
        .filter_map(NotionProperty::plain_text)
        .find(|text| !text.trim().is_empty())
}

fn date_property<'a>(
    page: &'a NotionPage,
    candidates: &[&str],
) -> Option<&'a calsync_domain::NotionDate> {
    candidates.iter().filter_map(|name| page.properties.get(*name)).find_map(NotionProperty::date)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn page(properties: serde_json::Value) -> NotionPage {
        serde_json::from_value(serde_json::json!({
            "id": "page-1",
            "last_edited_time": "2024-05-01T10:00:00.000Z",
            "properties": properties,
        }))
        .unwrap()
    }

    #[test]
    fn alternate_names_and_missing_end() {
        let page = page(serde_json::json!({
            "Name": {"type": "title", "title": [{"plain_text": "Kickoff"}]},
            "Date": {"type": "date", "date": {"start": "2024-05-03T15:00:00.000Z"}}
        }));

        let event = notion_to_unified(&page, now()).unwrap();

        assert_eq!(event.title, "Kickoff");
        assert_eq!(event.end, event.start);
        assert_eq!(event.duration, 60);
        assert_eq!(event.provider, ProviderKind::Notion);
        assert_eq!(event.remote_modified_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn earlier_candidate_wins() {
        let page = page(serde_json::json!({
            "Title": {"type": "title", "title": [{"plain_text": "Primary"}]},
            "name": {"type": "rich_text", "rich_text": [{"plain_text": "Secondary"}]}
        }));
        assert_eq!(notion_to_unified(&page, now()).unwrap().title, "Primary");
    }

    #[test]
    fn wrong_type_candidate_is_skipped() {
        let page = page(serde_json::json!({
            "Date": {"type": "rich_text", "rich_text": [{"plain_text": "soon"}]},
            "When": {"type": "date", "date": {"start": "2024-05-04", "end": "2024-05-06"}}
        }));

        let event = notion_to_unified(&page, now()).unwrap();

        assert!(event.all_day);
        assert!(event.multi_day);
        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn text_fields_and_local_id() {
        let page = page(serde_json::json!({
            "Description": {"type": "rich_text", "rich_text": [{"plain_text": "agenda"}]},
            "location": {"type": "rich_text", "rich_text": [{"plain_text": "HQ"}]},
            "Notes": {"type": "rich_text", "rich_text": []},
            "notes": {"type": "rich_text", "rich_text": [{"plain_text": "fallback notes"}]},
            "Event ID": {"type": "rich_text", "rich_text": [{"plain_text": "evt-7"}]}
        }));

        let event = notion_to_unified(&page, now()).unwrap();

        assert_eq!(event.description.as_deref(), Some("agenda"));
        assert_eq!(event.location.as_deref(), Some("HQ"));
        assert_eq!(event.notes.as_deref(), Some("fallback notes"));
        assert_eq!(event.local_event_hint.as_deref(), Some("evt-7"));
        assert_eq!(event.start, now());
    }

    #[test]
    fn malformed_date_is_an_error() {
        let page = page(serde_json::json!({
            "Date": {"type": "date", "date": {"start": "05/03/2024"}}
        }));
        assert!(notion_to_unified(&page, now()).is_err());
    }
}
