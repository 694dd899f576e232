//! Scripted provider adapter and a static registry

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calsync_core::mapping::to_unified;
use calsync_core::{unsupported, ProviderAdapter, ProviderRegistry};
use calsync_domain::{
    CalSyncError, OutboundEvent, ProviderCapabilities, ProviderKind, RawProviderItem, RemoteWrite,
    Result as DomainResult, TokenGrant, UnifiedEvent, WebhookRegistration, WebhookRequest,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// One recorded `list_changes` call.
#[derive(Debug, Clone)]
pub struct ListCall {
    pub access_token: String,
    pub calendar_id: String,
    pub since: DateTime<Utc>,
}

/// Adapter whose responses are set up by the test.
pub struct ScriptedAdapter {
    kind: ProviderKind,
    capabilities: ProviderCapabilities,
    items: Mutex<Vec<RawProviderItem>>,
    list_error: Mutex<Option<CalSyncError>>,
    list_calls: Mutex<Vec<ListCall>>,
    hold_next_list: AtomicBool,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    refresh_grant: Mutex<Option<DomainResult<TokenGrant>>>,
    refresh_calls: Mutex<Vec<String>>,
    created: Mutex<Vec<OutboundEvent>>,
    updated: Mutex<Vec<(String, OutboundEvent)>>,
    failing_writes: Mutex<HashSet<String>>,
    registered: Mutex<Vec<WebhookRequest>>,
    register_error: Mutex<Option<CalSyncError>>,
    unregistered: Mutex<Vec<String>>,
    unregister_fails: AtomicBool,
}

impl ScriptedAdapter {
    pub fn new(kind: ProviderKind) -> Self {
        let capabilities = match kind {
            ProviderKind::Google => ProviderCapabilities::PUSH_AND_POLL,
            ProviderKind::Notion => ProviderCapabilities::POLL_ONLY,
        };
        Self {
            kind,
            capabilities,
            items: Mutex::new(Vec::new()),
            list_error: Mutex::new(None),
            list_calls: Mutex::new(Vec::new()),
            hold_next_list: AtomicBool::new(false),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            refresh_grant: Mutex::new(None),
            refresh_calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
            failing_writes: Mutex::new(HashSet::new()),
            registered: Mutex::new(Vec::new()),
            register_error: Mutex::new(None),
            unregistered: Mutex::new(Vec::new()),
            unregister_fails: AtomicBool::new(false),
        }
    }

    pub fn set_items(&self, items: Vec<RawProviderItem>) {
        *self.items.lock() = items;
    }

    pub fn fail_listing(&self, error: CalSyncError) {
        *self.list_error.lock() = Some(error);
    }

    /// Block the next `list_changes` until `release` is notified.
    pub fn hold_next_list(&self) {
        self.hold_next_list.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls.lock().clone()
    }

    pub fn max_concurrent_lists(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn set_refresh_grant(&self, grant: DomainResult<TokenGrant>) {
        *self.refresh_grant.lock() = Some(grant);
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.refresh_calls.lock().clone()
    }

    pub fn created(&self) -> Vec<OutboundEvent> {
        self.created.lock().clone()
    }

    pub fn updated(&self) -> Vec<(String, OutboundEvent)> {
        self.updated.lock().clone()
    }

    pub fn fail_writes_for(&self, local_id: &str) {
        self.failing_writes.lock().insert(local_id.to_string());
    }

    pub fn registered(&self) -> Vec<WebhookRequest> {
        self.registered.lock().clone()
    }

    pub fn fail_registration(&self, error: CalSyncError) {
        *self.register_error.lock() = Some(error);
    }

    pub fn unregistered(&self) -> Vec<String> {
        self.unregistered.lock().clone()
    }

    pub fn fail_unregistration(&self) {
        self.unregister_fails.store(true, Ordering::SeqCst);
    }

    fn write(&self, event: &OutboundEvent, external_id: String) -> DomainResult<RemoteWrite> {
        if self.failing_writes.lock().contains(&event.local_id) {
            return Err(CalSyncError::Network("provider rejected write".into()));
        }
        Ok(RemoteWrite { external_id, remote_modified_at: Utc::now() })
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn list_changes(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<RawProviderItem>> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        self.list_calls.lock().push(ListCall {
            access_token: access_token.to_string(),
            calendar_id: external_calendar_id.to_string(),
            since,
        });

        if self.hold_next_list.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        if let Some(error) = self.list_error.lock().clone() {
            return Err(error);
        }
        Ok(self.items.lock().clone())
    }

    fn to_unified_event(&self, item: &RawProviderItem) -> DomainResult<UnifiedEvent> {
        to_unified(item, Utc::now())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> DomainResult<TokenGrant> {
        self.refresh_calls.lock().push(refresh_token.to_string());
        self.refresh_grant
            .lock()
            .clone()
            .unwrap_or_else(|| Err(unsupported(self.kind, "token refresh")))
    }

    async fn create_event(
        &self,
        _access_token: &str,
        _external_calendar_id: &str,
        event: &OutboundEvent,
    ) -> DomainResult<RemoteWrite> {
        let write = self.write(event, format!("remote-{}", event.local_id))?;
        self.created.lock().push(event.clone());
        Ok(write)
    }

    async fn update_event(
        &self,
        _access_token: &str,
        _external_calendar_id: &str,
        external_id: &str,
        event: &OutboundEvent,
    ) -> DomainResult<RemoteWrite> {
        let write = self.write(event, external_id.to_string())?;
        self.updated.lock().push((external_id.to_string(), event.clone()));
        Ok(write)
    }

    async fn register_webhook(
        &self,
        _access_token: &str,
        _external_calendar_id: &str,
        request: &WebhookRequest,
    ) -> DomainResult<WebhookRegistration> {
        if !self.capabilities.supports_push {
            return Err(unsupported(self.kind, "push notifications"));
        }
        if let Some(error) = self.register_error.lock().clone() {
            return Err(error);
        }
        self.registered.lock().push(request.clone());
        Ok(WebhookRegistration {
            channel_id: request.channel_id.clone(),
            resource_id: Some(format!("resource-{}", request.channel_id)),
            expires_at: Utc::now() + Duration::days(7),
        })
    }

    async fn unregister_webhook(
        &self,
        _access_token: &str,
        channel_id: &str,
        _resource_id: Option<&str>,
    ) -> DomainResult<()> {
        if self.unregister_fails.load(Ordering::SeqCst) {
            return Err(CalSyncError::Network("provider unreachable".into()));
        }
        self.unregistered.lock().push(channel_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl StaticRegistry {
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }
}

impl ProviderRegistry for StaticRegistry {
    fn adapter(&self, kind: ProviderKind) -> DomainResult<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned().ok_or_else(|| unsupported(kind, "syncing"))
    }
}
