//! Push-channel lifecycle and notification ingress

use std::sync::Arc;

use calsync_domain::{
    CalSyncError, CalendarIntegration, IgnoreReason, NotificationOutcome, Result, ResourceState,
    SyncRequest, SyncTrigger, WebhookChannel, WebhookNotification, WebhookRegistration,
    WebhookRequest,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::ports::{IntegrationRepository, SyncQueue};
use crate::provider::{unsupported, ProviderAdapter, ProviderRegistry};
use crate::sync::{load_active_integration, CredentialResolver};

const CHANNEL_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Public URL the provider delivers notifications to.
    pub callback_url: String,
    pub ttl: std::time::Duration,
    /// Channels expiring within this window are renewed.
    pub renew_before: Duration,
}

/// Result of one renewal sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalReport {
    pub renewed: Vec<String>,
    /// `(integration_id, error)` for every channel that could not be renewed.
    pub failed: Vec<(String, String)>,
}

pub struct WebhookService {
    integrations: Arc<dyn IntegrationRepository>,
    providers: Arc<dyn ProviderRegistry>,
    credentials: Arc<CredentialResolver>,
    queue: Arc<dyn SyncQueue>,
    config: WebhookConfig,
}

impl WebhookService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        providers: Arc<dyn ProviderRegistry>,
        credentials: Arc<CredentialResolver>,
        queue: Arc<dyn SyncQueue>,
        config: WebhookConfig,
    ) -> Self {
        Self { integrations, providers, credentials, queue, config }
    }

    /// Open a fresh channel and record it, replacing any previous one.
    ///
    /// Nothing is persisted unless the provider confirmed the channel. The
    /// previous channel is stopped after the new one is stored.
    #[instrument(skip(self), fields(provider = tracing::field::Empty))]
    pub async fn register(&self, integration_id: &str) -> Result<WebhookRegistration> {
        let integration = load_active_integration(self.integrations.as_ref(), integration_id).await?;
        tracing::Span::current().record("provider", tracing::field::display(integration.provider));

        let adapter = self.providers.adapter(integration.provider)?;
        if !adapter.capabilities().supports_push {
            return Err(unsupported(integration.provider, "push notifications"));
        }
        let access_token =
            self.credentials.access_token(&integration, adapter.as_ref(), Utc::now()).await?;

        let channel_token = generate_channel_token();
        let request = WebhookRequest {
            channel_id: Uuid::new_v4().to_string(),
            callback_url: self.config.callback_url.clone(),
            channel_token: channel_token.clone(),
            ttl: self.config.ttl,
        };
        let registration =
            adapter.register_webhook(&access_token, &integration.external_id, &request).await?;

        let channel = WebhookChannel {
            channel_id: registration.channel_id.clone(),
            resource_id: registration.resource_id.clone(),
            expires_at: registration.expires_at,
            token_hash: Some(self.credentials.vault().hash(&channel_token)),
        };
        if let Err(err) = self.integrations.set_webhook(&integration.id, &channel).await {
            error!(channel_id = %channel.channel_id, error = %err, "failed to persist channel; stopping it");
            stop_channel(adapter.as_ref(), &access_token, &channel).await;
            return Err(err);
        }

        if let Some(previous) = &integration.webhook {
            stop_channel(adapter.as_ref(), &access_token, previous).await;
        }

        info!(
            channel_id = %registration.channel_id,
            expires_at = %registration.expires_at,
            "webhook registered"
        );
        Ok(registration)
    }

    /// Stop the channel at the provider and clear it locally. The local
    /// fields are cleared even when the provider cannot be reached.
    #[instrument(skip(self))]
    pub async fn unregister(&self, integration_id: &str) -> Result<()> {
        let integration = self
            .integrations
            .get(integration_id)
            .await?
            .ok_or_else(|| CalSyncError::NotFound(format!("integration {integration_id}")))?;
        let Some(channel) = integration.webhook.clone() else {
            return Err(CalSyncError::InvalidInput(format!(
                "integration {integration_id} has no active webhook"
            )));
        };

        match self.provider_session(&integration).await {
            Ok((adapter, access_token)) => {
                stop_channel(adapter.as_ref(), &access_token, &channel).await;
            }
            Err(err) => {
                warn!(error = %err, "provider unavailable; channel will lapse at its expiry");
            }
        }

        self.integrations.clear_webhook(integration_id).await?;
        info!(channel_id = %channel.channel_id, "webhook unregistered");
        Ok(())
    }

    /// Classify a delivery and queue a pass when something changed.
    ///
    /// Never waits for the pass. Unknown channels and token mismatches are
    /// dropped without side effects.
    #[instrument(skip(self, notification), fields(channel_id = %notification.channel_id))]
    pub async fn handle_notification(
        &self,
        notification: &WebhookNotification,
    ) -> Result<NotificationOutcome> {
        let Some(integration) =
            self.integrations.find_by_webhook_id(&notification.channel_id).await?
        else {
            warn!("notification for unknown channel ignored");
            return Ok(NotificationOutcome::Ignored(IgnoreReason::UnknownChannel));
        };

        if !self.token_matches(&integration, notification) {
            warn!(integration_id = %integration.id, "notification token mismatch ignored");
            return Ok(NotificationOutcome::Ignored(IgnoreReason::TokenMismatch));
        }

        match &notification.resource_state {
            ResourceState::Sync => {
                debug!(integration_id = %integration.id, "channel verified");
                Ok(NotificationOutcome::Verified)
            }
            ResourceState::Exists => {
                let request = SyncRequest::new(integration.id.clone(), SyncTrigger::Webhook);
                match self.queue.enqueue(request) {
                    Ok(()) => {
                        info!(integration_id = %integration.id, "sync queued from webhook");
                        Ok(NotificationOutcome::SyncQueued)
                    }
                    Err(err) => {
                        warn!(integration_id = %integration.id, error = %err, "sync queue unavailable");
                        Ok(NotificationOutcome::Ignored(IgnoreReason::QueueUnavailable))
                    }
                }
            }
            ResourceState::Other(state) => {
                debug!(state = %state, "unhandled resource state ignored");
                Ok(NotificationOutcome::Ignored(IgnoreReason::UnhandledState))
            }
        }
    }

    /// Re-register every active channel expiring within the renewal window.
    #[instrument(skip(self))]
    pub async fn renew_expiring(&self, now: DateTime<Utc>) -> Result<RenewalReport> {
        let cutoff = now + self.config.renew_before;
        let expiring = self.integrations.list_webhooks_expiring_before(cutoff).await?;

        let mut report = RenewalReport::default();
        for integration in expiring {
            match self.register(&integration.id).await {
                Ok(_) => report.renewed.push(integration.id),
                Err(err) => {
                    error!(integration_id = %integration.id, error = %err, "webhook renewal failed");
                    report.failed.push((integration.id, err.summary()));
                }
            }
        }

        if !report.renewed.is_empty() || !report.failed.is_empty() {
            info!(renewed = report.renewed.len(), failed = report.failed.len(), "webhook renewal sweep");
        }
        Ok(report)
    }

    fn token_matches(
        &self,
        integration: &CalendarIntegration,
        notification: &WebhookNotification,
    ) -> bool {
        let Some(expected) = integration.webhook.as_ref().and_then(|c| c.token_hash.as_deref())
        else {
            return true;
        };
        notification
            .channel_token
            .as_deref()
            .is_some_and(|token| self.credentials.vault().verify_hash(token, expected))
    }

    async fn provider_session(
        &self,
        integration: &CalendarIntegration,
    ) -> Result<(Arc<dyn ProviderAdapter>, String)> {
        let adapter = self.providers.adapter(integration.provider)?;
        let access_token =
            self.credentials.access_token(integration, adapter.as_ref(), Utc::now()).await?;
        Ok((adapter, access_token))
    }
}

async fn stop_channel(adapter: &dyn ProviderAdapter, access_token: &str, channel: &WebhookChannel) {
    let stopped = adapter
        .unregister_webhook(access_token, &channel.channel_id, channel.resource_id.as_deref())
        .await;
    if let Err(err) = stopped {
        warn!(channel_id = %channel.channel_id, error = %err, "failed to stop channel at provider");
    }
}

fn generate_channel_token() -> String {
    let mut bytes = [0u8; CHANNEL_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
