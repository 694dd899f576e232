//! SQLite implementation of the local event store.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::EventRepository;
use calsync_domain::{Event, Result};
use rusqlite::Row;
use tracing::instrument;

use super::manager::{bool_to_int, int_to_bool, map_storage_error, with_connection, DbManager};

pub struct SqliteEventRepository {
    db: Arc<DbManager>,
}

impl SqliteEventRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn get(&self, id: &str) -> Result<Option<Event>> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row_optional(
                "SELECT id, title, description, start_at, end_at, location, notes, all_day,
                        multi_day, created_at, updated_at
                 FROM events WHERE id = ?1",
                &[&id],
                map_event_row,
            )
            .map_err(map_storage_error)
        })
        .await
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn save(&self, event: &Event) -> Result<()> {
        let event = event.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO events (
                    id, title, description, start_at, end_at, location, notes, all_day,
                    multi_day, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    start_at = excluded.start_at,
                    end_at = excluded.end_at,
                    location = excluded.location,
                    notes = excluded.notes,
                    all_day = excluded.all_day,
                    multi_day = excluded.multi_day,
                    updated_at = excluded.updated_at",
                &[
                    &event.id,
                    &event.title,
                    &event.description,
                    &event.start_at,
                    &event.end_at,
                    &event.location,
                    &event.notes,
                    &bool_to_int(event.all_day),
                    &bool_to_int(event.multi_day),
                    &event.created_at,
                    &event.updated_at,
                ],
            )
            .map_err(map_storage_error)?;
            Ok(())
        })
        .await
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_at: row.get(3)?,
        end_at: row.get(4)?,
        location: row.get(5)?,
        notes: row.get(6)?,
        all_day: int_to_bool(row.get(7)?),
        multi_day: int_to_bool(row.get(8)?),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
