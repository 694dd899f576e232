//! SQLite implementation of the reconciliation ledger.
//!
//! Every write is the `(event_id, integration_id)` upsert; the only delete is
//! an explicit unlink.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_common::storage::SqliteConnection;
use calsync_core::LedgerRepository;
use calsync_domain::{CalSyncError, EventSync, LedgerUpsert, ProviderKind, Result, SyncStatus};
use rusqlite::types::Type;
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::{map_storage_error, with_connection, DbManager};

const SELECT_COLUMNS: &str = "SELECT event_id, integration_id, external_id, provider, sync_status,
        last_sync_at, local_version, remote_version, remote_fingerprint, last_error
    FROM event_sync";

const UPSERT_SQL: &str = "INSERT INTO event_sync (
        event_id, integration_id, external_id, provider, sync_status, last_sync_at,
        local_version, remote_version, remote_fingerprint, last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(event_id, integration_id) DO UPDATE SET
        external_id = excluded.external_id,
        provider = excluded.provider,
        sync_status = excluded.sync_status,
        last_sync_at = excluded.last_sync_at,
        local_version = excluded.local_version,
        remote_version = excluded.remote_version,
        remote_fingerprint = excluded.remote_fingerprint,
        last_error = excluded.last_error";

pub struct SqliteLedgerRepository {
    db: Arc<DbManager>,
}

impl SqliteLedgerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn fetch(
        conn: &SqliteConnection,
        filter: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<EventSync>> {
        let sql = format!("{SELECT_COLUMNS} WHERE {filter}");
        conn.query_row_optional(&sql, params, map_ledger_row).map_err(map_storage_error)
    }
}

#[async_trait]
impl LedgerRepository for SqliteLedgerRepository {
    #[instrument(
        skip(self, entry),
        fields(event_id = %entry.event_id, integration_id = %entry.integration_id, status = %entry.status)
    )]
    async fn upsert(&self, entry: &LedgerUpsert) -> Result<EventSync> {
        let entry = entry.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                UPSERT_SQL,
                &[
                    &entry.event_id,
                    &entry.integration_id,
                    &entry.external_id,
                    &entry.provider.as_str(),
                    &entry.status.as_str(),
                    &entry.last_sync_at,
                    &entry.local_version,
                    &entry.remote_version,
                    &entry.remote_fingerprint,
                    &entry.last_error,
                ],
            )
            .map_err(map_storage_error)?;
            debug!("ledger row upserted");

            Self::fetch(
                conn,
                "event_id = ?1 AND integration_id = ?2",
                &[&entry.event_id, &entry.integration_id],
            )?
            .ok_or_else(|| {
                CalSyncError::Internal(format!(
                    "ledger row ({}, {}) missing after upsert",
                    entry.event_id, entry.integration_id
                ))
            })
        })
        .await
    }

    async fn get(&self, event_id: &str, integration_id: &str) -> Result<Option<EventSync>> {
        let event_id = event_id.to_string();
        let integration_id = integration_id.to_string();
        with_connection(&self.db, move |conn| {
            Self::fetch(conn, "event_id = ?1 AND integration_id = ?2", &[&event_id, &integration_id])
        })
        .await
    }

    async fn find_by_external_id(
        &self,
        integration_id: &str,
        external_id: &str,
    ) -> Result<Option<EventSync>> {
        let integration_id = integration_id.to_string();
        let external_id = external_id.to_string();
        with_connection(&self.db, move |conn| {
            Self::fetch(
                conn,
                "integration_id = ?1 AND external_id = ?2",
                &[&integration_id, &external_id],
            )
        })
        .await
    }

    async fn list_for_integration(&self, integration_id: &str) -> Result<Vec<EventSync>> {
        let integration_id = integration_id.to_string();
        with_connection(&self.db, move |conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE integration_id = ?1 ORDER BY event_id");
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(&[&integration_id], map_ledger_row).map_err(map_storage_error)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, event_id: &str, integration_id: &str) -> Result<bool> {
        let event_id = event_id.to_string();
        let integration_id = integration_id.to_string();
        with_connection(&self.db, move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM event_sync WHERE event_id = ?1 AND integration_id = ?2",
                    &[&event_id, &integration_id],
                )
                .map_err(map_storage_error)?;
            Ok(removed > 0)
        })
        .await
    }
}

fn map_ledger_row(row: &Row<'_>) -> rusqlite::Result<EventSync> {
    let provider_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;

    Ok(EventSync {
        event_id: row.get(0)?,
        integration_id: row.get(1)?,
        external_id: row.get(2)?,
        provider: provider_raw
            .parse::<ProviderKind>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
        sync_status: status_raw
            .parse::<SyncStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        last_sync_at: row.get(5)?,
        local_version: row.get(6)?,
        remote_version: row.get(7)?,
        remote_fingerprint: row.get(8)?,
        last_error: row.get(9)?,
    })
}
