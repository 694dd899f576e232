//! SQLite repository coverage against the real schema.

mod support;

use std::sync::Arc;

use calsync_core::{EventRepository, IntegrationRepository, LedgerRepository};
use calsync_domain::{
    CalSyncError, LedgerUpsert, ProviderKind, StoredTokens, SyncStatus, WebhookChannel,
};
use calsync_infra::database::{
    SqliteEventRepository, SqliteIntegrationRepository, SqliteLedgerRepository,
};
use support::{at, event, new_integration, TestDatabase};

fn ledger_entry(event_id: &str, integration_id: &str, external_id: Option<&str>) -> LedgerUpsert {
    LedgerUpsert {
        event_id: event_id.to_string(),
        integration_id: integration_id.to_string(),
        external_id: external_id.map(str::to_string),
        provider: ProviderKind::Google,
        status: SyncStatus::Synced,
        local_version: Some(at(10, 8, 0)),
        remote_version: Some(at(10, 8, 0)),
        remote_fingerprint: Some("f00d".into()),
        last_sync_at: Some(at(10, 8, 1)),
        last_error: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn integration_lifecycle_round_trip() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));

    let created = repo
        .insert(&new_integration("int-1", ProviderKind::Google, "primary"))
        .await
        .expect("insert should succeed");
    assert!(created.is_active);
    assert_eq!(created.provider, ProviderKind::Google);
    assert!(created.webhook.is_none());

    repo.record_sync_failure("int-1", "Network: boom").await.unwrap();
    let failed = repo.get("int-1").await.unwrap().unwrap();
    assert_eq!(failed.last_sync_error.as_deref(), Some("Network: boom"));
    assert!(failed.last_sync_at.is_none());

    repo.record_sync_success("int-1", at(11, 9, 30)).await.unwrap();
    let synced = repo.get("int-1").await.unwrap().unwrap();
    assert_eq!(synced.last_sync_at, Some(at(11, 9, 30)));
    assert!(synced.last_sync_error.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_integration_id_is_rejected() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));

    repo.insert(&new_integration("int-1", ProviderKind::Notion, "db-1")).await.unwrap();
    let err = repo
        .insert(&new_integration("int-1", ProviderKind::Notion, "db-2"))
        .await
        .expect_err("second insert should fail");

    assert!(matches!(err, CalSyncError::Database(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn updates_on_missing_integration_are_not_found() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));

    assert!(repo.get("ghost").await.unwrap().is_none());
    let err = repo.record_sync_success("ghost", at(1, 0, 0)).await.unwrap_err();
    assert!(matches!(err, CalSyncError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn webhook_channel_lookup_and_expiry() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    repo.insert(&new_integration("int-a", ProviderKind::Google, "a")).await.unwrap();
    repo.insert(&new_integration("int-b", ProviderKind::Google, "b")).await.unwrap();

    let soon = WebhookChannel {
        channel_id: "chan-a".into(),
        resource_id: Some("res-a".into()),
        expires_at: at(12, 0, 0),
        token_hash: Some("hash-a".into()),
    };
    let later = WebhookChannel {
        channel_id: "chan-b".into(),
        resource_id: None,
        expires_at: at(19, 0, 0),
        token_hash: None,
    };
    repo.set_webhook("int-a", &soon).await.unwrap();
    repo.set_webhook("int-b", &later).await.unwrap();

    let found = repo.find_by_webhook_id("chan-a").await.unwrap().expect("channel should match");
    assert_eq!(found.id, "int-a");
    assert_eq!(found.webhook, Some(soon));

    let expiring = repo.list_webhooks_expiring_before(at(13, 0, 0)).await.unwrap();
    let ids: Vec<_> = expiring.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["int-a"]);

    repo.clear_webhook("int-a").await.unwrap();
    assert!(repo.find_by_webhook_id("chan-a").await.unwrap().is_none());
    assert!(repo.get("int-a").await.unwrap().unwrap().webhook.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn deactivate_clears_channel_and_hides_from_active() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    repo.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();
    repo.set_webhook(
        "int-1",
        &WebhookChannel {
            channel_id: "chan-1".into(),
            resource_id: None,
            expires_at: at(12, 0, 0),
            token_hash: None,
        },
    )
    .await
    .unwrap();

    repo.deactivate("int-1", "TokenRevoked: invalid_grant").await.unwrap();

    let stored = repo.get("int-1").await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert!(stored.webhook.is_none());
    assert_eq!(stored.last_sync_error.as_deref(), Some("TokenRevoked: invalid_grant"));
    assert!(repo.list_active().await.unwrap().is_empty());
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
    assert!(repo.find_by_webhook_id("chan-1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn save_tokens_keeps_refresh_token_when_absent() {
    let db = TestDatabase::new();
    let repo = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    repo.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();

    repo.save_tokens(
        "int-1",
        &StoredTokens {
            encrypted_access_token: "enc-access-2".into(),
            encrypted_refresh_token: None,
            token_expires_at: Some(at(21, 12, 0)),
        },
    )
    .await
    .unwrap();

    let stored = repo.get("int-1").await.unwrap().unwrap();
    assert_eq!(stored.encrypted_access_token, "enc-access-2");
    assert_eq!(stored.encrypted_refresh_token.as_deref(), Some("enc-refresh-int-1"));
    assert_eq!(stored.token_expires_at, Some(at(21, 12, 0)));

    repo.save_tokens(
        "int-1",
        &StoredTokens {
            encrypted_access_token: "enc-access-3".into(),
            encrypted_refresh_token: Some("enc-refresh-rotated".into()),
            token_expires_at: None,
        },
    )
    .await
    .unwrap();

    let rotated = repo.get("int-1").await.unwrap().unwrap();
    assert_eq!(rotated.encrypted_refresh_token.as_deref(), Some("enc-refresh-rotated"));
}

#[tokio::test(flavor = "multi_thread")]
async fn event_save_overwrites_but_keeps_created_at() {
    let db = TestDatabase::new();
    let repo = SqliteEventRepository::new(Arc::clone(&db.manager));

    let original = event("evt-1", "Standup", at(9, 8, 0));
    repo.save(&original).await.unwrap();

    let mut edited = original.clone();
    edited.title = "Standup (moved)".into();
    edited.location = Some("Room 4".into());
    edited.created_at = at(9, 23, 0);
    edited.updated_at = at(9, 23, 0);
    repo.save(&edited).await.unwrap();

    let stored = repo.get("evt-1").await.unwrap().expect("event should exist");
    assert_eq!(stored.title, "Standup (moved)");
    assert_eq!(stored.location.as_deref(), Some("Room 4"));
    assert_eq!(stored.created_at, at(9, 8, 0));
    assert_eq!(stored.updated_at, at(9, 23, 0));
    assert!(repo.get("evt-missing").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_upsert_is_idempotent_per_pair() {
    let db = TestDatabase::new();
    let integrations = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    let events = SqliteEventRepository::new(Arc::clone(&db.manager));
    let ledger = SqliteLedgerRepository::new(Arc::clone(&db.manager));

    integrations.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();
    events.save(&event("evt-1", "Review", at(10, 8, 0))).await.unwrap();

    let first = ledger.upsert(&ledger_entry("evt-1", "int-1", Some("g-1"))).await.unwrap();
    assert_eq!(first.sync_status, SyncStatus::Synced);

    let mut conflict = ledger_entry("evt-1", "int-1", Some("g-1"));
    conflict.status = SyncStatus::Conflict;
    conflict.remote_version = Some(at(10, 9, 0));
    let second = ledger.upsert(&conflict).await.unwrap();

    assert_eq!(second.sync_status, SyncStatus::Conflict);
    assert_eq!(second.remote_version, Some(at(10, 9, 0)));
    assert_eq!(ledger.list_for_integration("int-1").await.unwrap().len(), 1);

    let by_external = ledger.find_by_external_id("int-1", "g-1").await.unwrap().unwrap();
    assert_eq!(by_external.event_id, "evt-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_rejects_second_event_for_same_external_id() {
    let db = TestDatabase::new();
    let integrations = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    let events = SqliteEventRepository::new(Arc::clone(&db.manager));
    let ledger = SqliteLedgerRepository::new(Arc::clone(&db.manager));

    integrations.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();
    events.save(&event("evt-1", "One", at(10, 8, 0))).await.unwrap();
    events.save(&event("evt-2", "Two", at(10, 8, 0))).await.unwrap();

    ledger.upsert(&ledger_entry("evt-1", "int-1", Some("g-1"))).await.unwrap();
    let err = ledger.upsert(&ledger_entry("evt-2", "int-1", Some("g-1"))).await.unwrap_err();
    assert!(matches!(err, CalSyncError::Database(ref msg) if msg.contains("unique")));

    // pending rows carry no external id and never collide
    ledger.upsert(&ledger_entry("evt-2", "int-1", None)).await.unwrap();
    let pending = ledger.get("evt-2", "int-1").await.unwrap().unwrap();
    assert!(pending.external_id.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_delete_reports_existence() {
    let db = TestDatabase::new();
    let integrations = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    let events = SqliteEventRepository::new(Arc::clone(&db.manager));
    let ledger = SqliteLedgerRepository::new(Arc::clone(&db.manager));

    integrations.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();
    events.save(&event("evt-1", "One", at(10, 8, 0))).await.unwrap();
    ledger.upsert(&ledger_entry("evt-1", "int-1", Some("g-1"))).await.unwrap();

    assert!(ledger.delete("evt-1", "int-1").await.unwrap());
    assert!(!ledger.delete("evt-1", "int-1").await.unwrap());
    assert!(ledger.get("evt-1", "int-1").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_rows_block_deleting_their_event_or_integration() {
    let db = TestDatabase::new();
    let integrations = SqliteIntegrationRepository::new(Arc::clone(&db.manager));
    let events = SqliteEventRepository::new(Arc::clone(&db.manager));
    let ledger = SqliteLedgerRepository::new(Arc::clone(&db.manager));

    integrations.insert(&new_integration("int-1", ProviderKind::Google, "primary")).await.unwrap();
    events.save(&event("evt-1", "One", at(10, 8, 0))).await.unwrap();
    ledger.upsert(&ledger_entry("evt-1", "int-1", Some("g-1"))).await.unwrap();

    let conn = db.manager.get_connection().unwrap();
    assert!(conn.execute("DELETE FROM events WHERE id = ?1", &[&"evt-1"]).is_err());
    assert!(conn
        .execute("DELETE FROM calendar_integrations WHERE id = ?1", &[&"int-1"])
        .is_err());
    drop(conn);

    let row = ledger.get("evt-1", "int-1").await.unwrap().expect("ledger row kept");
    assert_eq!(row.external_id.as_deref(), Some("g-1"));
    assert_eq!(row.remote_fingerprint.as_deref(), Some("f00d"));
    assert!(events.get("evt-1").await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_requires_existing_event_and_integration() {
    let db = TestDatabase::new();
    let ledger = SqliteLedgerRepository::new(Arc::clone(&db.manager));

    let err = ledger.upsert(&ledger_entry("evt-x", "int-x", Some("g-1"))).await.unwrap_err();
    assert!(matches!(err, CalSyncError::Database(_)));
}
