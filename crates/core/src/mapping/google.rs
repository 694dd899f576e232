//! Google Calendar event mapping

use calsync_domain::{
    GoogleEventDateTime, GoogleEventItem, ProviderKind, Result, UnifiedEvent, UnifiedEventDraft,
};
use chrono::{DateTime, Utc};

use super::{parse_date, parse_timestamp, Boundary};

/// Private extended property carrying free-form notes.
pub const NOTES_PROPERTY: &str = "notes";

/// Private extended property carrying the local event id after a push.
pub const LOCAL_ID_PROPERTY: &str = "calsyncEventId";

/// Normalize a Google `Event` resource.
pub fn google_to_unified(item: &GoogleEventItem, now: DateTime<Utc>) -> Result<UnifiedEvent> {
    let start = item.start.as_ref().map(|s| boundary("start", s)).transpose()?.flatten();
    let end = item.end.as_ref().map(|e| boundary("end", e)).transpose()?.flatten();
    let remote_modified_at =
        item.updated.as_deref().map(|value| parse_timestamp("updated", value)).transpose()?;

    let private = item.extended_properties.as_ref().map(|props| &props.private);
    let all_day = start.is_some_and(|boundary| boundary.date_only);

    let draft = UnifiedEventDraft {
        title: item.summary.clone(),
        description: item.description.clone(),
        start: start.map(|boundary| boundary.at),
        end: end.map(|boundary| boundary.at),
        location: item.location.clone(),
        notes: private.and_then(|props| props.get(NOTES_PROPERTY).cloned()),
        all_day,
        all_day_end_exclusive: all_day,
        remote_modified_at,
        local_event_hint: private.and_then(|props| props.get(LOCAL_ID_PROPERTY).cloned()),
    };

    Ok(draft.finish(ProviderKind::Google, item.id.clone(), now))
}

/// `dateTime` wins over `date`; neither present means no boundary.
fn boundary(field: &str, value: &GoogleEventDateTime) -> Result<Option<Boundary>> {
    if let Some(date_time) = value.date_time.as_deref() {
        return parse_timestamp(field, date_time).map(|at| Some(Boundary { at, date_only: false }));
    }
    match value.date.as_deref() {
        Some(date) => parse_date(field, date).map(|at| Some(Boundary { at, date_only: true })),
        None => Ok(None),
    }
}
