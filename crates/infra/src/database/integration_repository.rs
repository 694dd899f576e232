//! SQLite implementation of the IntegrationRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use calsync_common::storage::SqliteConnection;
use calsync_core::IntegrationRepository;
use calsync_domain::{
    CalSyncError, CalendarIntegration, NewIntegration, ProviderKind, Result, StoredTokens,
    WebhookChannel,
};
use chrono::{DateTime, Utc};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::{int_to_bool, map_storage_error, with_connection, DbManager};

const SELECT_COLUMNS: &str = "SELECT id, provider, external_id, encrypted_access_token,
        encrypted_refresh_token, token_expires_at, webhook_id, webhook_resource_id,
        webhook_expires_at, webhook_token_hash, last_sync_at, last_sync_error, is_active,
        created_at, updated_at
    FROM calendar_integrations";

/// SQLite-backed integration store
pub struct SqliteIntegrationRepository {
    db: Arc<DbManager>,
}

impl SqliteIntegrationRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn query_one(
        conn: &SqliteConnection,
        filter: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<CalendarIntegration>> {
        let sql = format!("{SELECT_COLUMNS} WHERE {filter}");
        conn.query_row_optional(&sql, params, map_integration_row).map_err(map_storage_error)
    }

    fn query_many(
        conn: &SqliteConnection,
        filter: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<CalendarIntegration>> {
        let sql = format!("{SELECT_COLUMNS} {filter}");
        let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
        stmt.query_map(params, map_integration_row).map_err(map_storage_error)
    }
}

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    #[instrument(skip(self, integration), fields(integration_id = %integration.id, provider = %integration.provider))]
    async fn insert(&self, integration: &NewIntegration) -> Result<CalendarIntegration> {
        let new = integration.clone();
        with_connection(&self.db, move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO calendar_integrations (
                    id, provider, external_id, encrypted_access_token, encrypted_refresh_token,
                    token_expires_at, is_active, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
                &[
                    &new.id,
                    &new.provider.as_str(),
                    &new.external_id,
                    &new.encrypted_access_token,
                    &new.encrypted_refresh_token,
                    &new.token_expires_at,
                    &now,
                ],
            )
            .map_err(map_storage_error)?;

            debug!("integration inserted");
            Self::query_one(conn, "id = ?1", &[&new.id])?
                .ok_or_else(|| CalSyncError::Internal(format!("integration {} vanished", new.id)))
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<CalendarIntegration>> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| Self::query_one(conn, "id = ?1", &[&id])).await
    }

    async fn list_all(&self) -> Result<Vec<CalendarIntegration>> {
        with_connection(&self.db, |conn| Self::query_many(conn, "ORDER BY created_at, id", &[]))
            .await
    }

    async fn list_active(&self) -> Result<Vec<CalendarIntegration>> {
        with_connection(&self.db, |conn| {
            Self::query_many(conn, "WHERE is_active = 1 ORDER BY created_at, id", &[])
        })
        .await
    }

    #[instrument(skip(self))]
    async fn find_by_webhook_id(&self, channel_id: &str) -> Result<Option<CalendarIntegration>> {
        let channel_id = channel_id.to_string();
        with_connection(&self.db, move |conn| {
            Self::query_one(conn, "webhook_id = ?1 AND is_active = 1", &[&channel_id])
        })
        .await
    }

    async fn list_webhooks_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<CalendarIntegration>> {
        with_connection(&self.db, move |conn| {
            Self::query_many(
                conn,
                "WHERE is_active = 1 AND webhook_id IS NOT NULL AND webhook_expires_at <= ?1
                 ORDER BY webhook_expires_at",
                &[&cutoff],
            )
        })
        .await
    }

    async fn record_sync_success(&self, id: &str, synced_at: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET last_sync_at = ?2, last_sync_error = NULL, updated_at = ?3
                     WHERE id = ?1",
                    &[&id, &synced_at, &Utc::now()],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }

    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET last_sync_error = ?2, updated_at = ?3
                     WHERE id = ?1",
                    &[&id, &error, &Utc::now()],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn deactivate(&self, id: &str, reason: &str) -> Result<()> {
        let id = id.to_string();
        let reason = reason.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET is_active = 0, last_sync_error = ?2, webhook_id = NULL,
                         webhook_resource_id = NULL, webhook_expires_at = NULL,
                         webhook_token_hash = NULL, updated_at = ?3
                     WHERE id = ?1",
                    &[&id, &reason, &Utc::now()],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }

    #[instrument(skip(self, tokens))]
    async fn save_tokens(&self, id: &str, tokens: &StoredTokens) -> Result<()> {
        let id = id.to_string();
        let tokens = tokens.clone();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET encrypted_access_token = ?2,
                         encrypted_refresh_token = COALESCE(?3, encrypted_refresh_token),
                         token_expires_at = ?4, updated_at = ?5
                     WHERE id = ?1",
                    &[
                        &id,
                        &tokens.encrypted_access_token,
                        &tokens.encrypted_refresh_token,
                        &tokens.token_expires_at,
                        &Utc::now(),
                    ],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }

    #[instrument(skip(self, channel), fields(channel_id = %channel.channel_id))]
    async fn set_webhook(&self, id: &str, channel: &WebhookChannel) -> Result<()> {
        let id = id.to_string();
        let channel = channel.clone();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET webhook_id = ?2, webhook_resource_id = ?3, webhook_expires_at = ?4,
                         webhook_token_hash = ?5, updated_at = ?6
                     WHERE id = ?1",
                    &[
                        &id,
                        &channel.channel_id,
                        &channel.resource_id,
                        &channel.expires_at,
                        &channel.token_hash,
                        &Utc::now(),
                    ],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }

    async fn clear_webhook(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(
                    "UPDATE calendar_integrations
                     SET webhook_id = NULL, webhook_resource_id = NULL, webhook_expires_at = NULL,
                         webhook_token_hash = NULL, updated_at = ?2
                     WHERE id = ?1",
                    &[&id, &Utc::now()],
                )
                .map_err(map_storage_error)?;
            ensure_updated(changed, &id)
        })
        .await
    }
}

fn ensure_updated(changed: usize, id: &str) -> Result<()> {
    if changed == 0 {
        return Err(CalSyncError::NotFound(format!("integration {id}")));
    }
    Ok(())
}

fn map_integration_row(row: &Row<'_>) -> rusqlite::Result<CalendarIntegration> {
    let provider_raw: String = row.get(1)?;
    let provider = provider_raw.parse::<ProviderKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;

    let webhook_id: Option<String> = row.get(6)?;
    let webhook_expires_at: Option<DateTime<Utc>> = row.get(8)?;
    let webhook = match (webhook_id, webhook_expires_at) {
        (Some(channel_id), Some(expires_at)) => Some(WebhookChannel {
            channel_id,
            resource_id: row.get(7)?,
            expires_at,
            token_hash: row.get(9)?,
        }),
        _ => None,
    };

    Ok(CalendarIntegration {
        id: row.get(0)?,
        provider,
        external_id: row.get(2)?,
        encrypted_access_token: row.get(3)?,
        encrypted_refresh_token: row.get(4)?,
        token_expires_at: row.get(5)?,
        webhook,
        last_sync_at: row.get(10)?,
        last_sync_error: row.get(11)?,
        is_active: int_to_bool(row.get(12)?),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}
