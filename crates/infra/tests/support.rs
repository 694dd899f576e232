//! Shared fixtures for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use calsync_domain::{Event, NewIntegration, ProviderKind};
use calsync_infra::database::DbManager;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

/// Temporary database with migrations applied. The directory lives as long
/// as the wrapper.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("calsync-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).single().expect("valid timestamp")
}

pub fn new_integration(id: &str, provider: ProviderKind, external_id: &str) -> NewIntegration {
    NewIntegration {
        id: id.to_string(),
        provider,
        external_id: external_id.to_string(),
        encrypted_access_token: format!("enc-access-{id}"),
        encrypted_refresh_token: Some(format!("enc-refresh-{id}")),
        token_expires_at: Some(at(20, 12, 0)),
    }
}

pub fn event(id: &str, title: &str, updated_at: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        start_at: at(10, 9, 0),
        end_at: at(10, 10, 0),
        location: None,
        notes: None,
        all_day: false,
        multi_day: false,
        created_at: updated_at,
        updated_at,
    }
}
