//! Shared fixtures for `calsync-core` integration tests
//!
//! The harness wires every service over in-memory repositories and one
//! scripted adapter per provider.

#![allow(dead_code)]

pub mod provider;
pub mod repositories;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use calsync_common::crypto::CredentialVault;
use calsync_core::{
    AuthorizationStates, BatchSync, BatchSyncConfig, CredentialResolver, IntegrationService,
    PushService, SyncOrchestrator, WebhookConfig, WebhookService,
};
use calsync_domain::{
    CalendarIntegration, Event, GoogleEventDateTime, GoogleEventItem, NotionPage, ProviderKind,
    RawProviderItem,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

use self::provider::{ScriptedAdapter, StaticRegistry};
use self::repositories::{
    MockEventRepository, MockIntegrationRepository, MockLedgerRepository, RecordingQueue,
};

pub const ACCESS_TOKEN: &str = "access-token-1";
pub const REFRESH_TOKEN: &str = "refresh-token-1";

pub struct Harness {
    pub vault: Arc<CredentialVault>,
    pub integrations: MockIntegrationRepository,
    pub events: MockEventRepository,
    pub ledger: MockLedgerRepository,
    pub queue: RecordingQueue,
    pub google: Arc<ScriptedAdapter>,
    pub notion: Arc<ScriptedAdapter>,
    pub credentials: Arc<CredentialResolver>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub batch: Arc<BatchSync>,
    pub push: PushService,
    pub webhooks: WebhookService,
    pub states: Arc<AuthorizationStates>,
    pub onboarding: IntegrationService,
}

impl Harness {
    pub fn new() -> Self {
        let vault = Arc::new(CredentialVault::from_raw_key([7u8; 32]));
        let integrations = MockIntegrationRepository::default();
        let events = MockEventRepository::default();
        let ledger = MockLedgerRepository::default();
        let queue = RecordingQueue::default();
        let google = Arc::new(ScriptedAdapter::new(ProviderKind::Google));
        let notion = Arc::new(ScriptedAdapter::new(ProviderKind::Notion));
        let registry = Arc::new(
            StaticRegistry::default()
                .with(google.clone())
                .with(notion.clone()),
        );

        let credentials = Arc::new(CredentialResolver::new(
            Arc::clone(&vault),
            Arc::new(integrations.clone()),
            Duration::seconds(60),
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::new(integrations.clone()),
            Arc::new(events.clone()),
            Arc::new(ledger.clone()),
            registry.clone(),
            Arc::clone(&credentials),
        ));
        let batch = Arc::new(BatchSync::new(
            Arc::clone(&orchestrator),
            BatchSyncConfig { max_concurrent_passes: 4, pass_timeout: StdDuration::from_secs(5) },
        ));
        let push = PushService::new(
            Arc::new(integrations.clone()),
            Arc::new(events.clone()),
            Arc::new(ledger.clone()),
            registry.clone(),
            Arc::clone(&credentials),
        );
        let webhooks = WebhookService::new(
            Arc::new(integrations.clone()),
            registry,
            Arc::clone(&credentials),
            Arc::new(queue.clone()),
            WebhookConfig {
                callback_url: "https://calsync.test/webhooks/google".into(),
                ttl: StdDuration::from_secs(7 * 24 * 3600),
                renew_before: Duration::days(1),
            },
        );
        let states = Arc::new(AuthorizationStates::new(Duration::minutes(10)));
        let onboarding =
            IntegrationService::new(Arc::new(integrations.clone()), Arc::clone(&vault), Arc::clone(&states));

        Self {
            vault,
            integrations,
            events,
            ledger,
            queue,
            google,
            notion,
            credentials,
            orchestrator,
            batch,
            push,
            webhooks,
            states,
            onboarding,
        }
    }

    /// Seed an active integration with an encrypted, non-expiring token.
    pub fn add_integration(&self, id: &str, provider: ProviderKind) -> CalendarIntegration {
        let created = at(0, 0);
        let integration = CalendarIntegration {
            id: id.to_string(),
            provider,
            external_id: format!("{id}-calendar"),
            encrypted_access_token: self.vault.encrypt(ACCESS_TOKEN).unwrap(),
            encrypted_refresh_token: Some(self.vault.encrypt(REFRESH_TOKEN).unwrap()),
            token_expires_at: None,
            webhook: None,
            last_sync_at: None,
            last_sync_error: None,
            is_active: true,
            created_at: created,
            updated_at: created,
        };
        self.integrations.put(integration.clone());
        integration
    }

    pub fn update_integration(&self, id: &str, f: impl FnOnce(&mut CalendarIntegration)) {
        let mut integration = self.integrations.snapshot(id);
        f(&mut integration);
        self.integrations.put(integration);
    }
}

/// Fixed instant on 2024-03-01.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
}

pub fn google_item(id: &str, title: &str, updated: DateTime<Utc>) -> RawProviderItem {
    RawProviderItem::Google(GoogleEventItem {
        id: id.to_string(),
        summary: Some(title.to_string()),
        start: Some(GoogleEventDateTime {
            date_time: Some("2024-03-05T09:00:00Z".into()),
            ..Default::default()
        }),
        end: Some(GoogleEventDateTime {
            date_time: Some("2024-03-05T10:30:00Z".into()),
            ..Default::default()
        }),
        updated: Some(updated.to_rfc3339()),
        ..Default::default()
    })
}

pub fn google_item_with_hint(
    id: &str,
    title: &str,
    updated: DateTime<Utc>,
    local_id: &str,
) -> RawProviderItem {
    let RawProviderItem::Google(mut item) = google_item(id, title, updated) else {
        unreachable!()
    };
    item.extended_properties = Some(calsync_domain::GoogleExtendedProperties {
        private: HashMap::from([("calsyncEventId".to_string(), local_id.to_string())]),
    });
    RawProviderItem::Google(item)
}

pub fn notion_page(value: serde_json::Value) -> RawProviderItem {
    let page: NotionPage = serde_json::from_value(value).unwrap();
    RawProviderItem::Notion(page)
}

pub fn local_event(id: &str, title: &str, updated_at: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        start_at: at(9, 0),
        end_at: at(10, 0),
        location: None,
        notes: None,
        all_day: false,
        multi_day: false,
        created_at: updated_at,
        updated_at,
    }
}
