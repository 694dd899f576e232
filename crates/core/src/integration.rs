//! Creation and listing of calendar integrations

use std::sync::Arc;

use calsync_common::crypto::CredentialVault;
use calsync_domain::{CalSyncError, IntegrationStatus, NewIntegration, ProviderKind, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::authorization::AuthorizationStates;
use crate::ports::IntegrationRepository;
use crate::sync::map_vault_error;

/// Tokens obtained by a completed authorization flow.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectIntegration {
    pub state: String,
    pub provider: ProviderKind,
    pub external_id: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, rename = "expiresIn")]
    pub expires_in_secs: Option<i64>,
}

impl std::fmt::Debug for ConnectIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectIntegration")
            .field("provider", &self.provider)
            .field("external_id", &self.external_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in_secs", &self.expires_in_secs)
            .finish_non_exhaustive()
    }
}

pub struct IntegrationService {
    integrations: Arc<dyn IntegrationRepository>,
    vault: Arc<CredentialVault>,
    states: Arc<AuthorizationStates>,
}

impl IntegrationService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        vault: Arc<CredentialVault>,
        states: Arc<AuthorizationStates>,
    ) -> Self {
        Self { integrations, vault, states }
    }

    pub fn states(&self) -> &AuthorizationStates {
        &self.states
    }

    /// Persist a new integration with encrypted credentials. The
    /// authorization state is consumed first.
    #[instrument(skip(self, request), fields(provider = %request.provider))]
    pub async fn connect(
        &self,
        request: ConnectIntegration,
        now: DateTime<Utc>,
    ) -> Result<IntegrationStatus> {
        self.states.validate_and_consume(&request.state, request.provider, now)?;

        if request.external_id.trim().is_empty() {
            return Err(CalSyncError::InvalidInput("externalId must not be empty".into()));
        }
        if request.access_token.trim().is_empty() {
            return Err(CalSyncError::InvalidInput("accessToken must not be empty".into()));
        }

        let integration = NewIntegration {
            id: Uuid::new_v4().to_string(),
            provider: request.provider,
            external_id: request.external_id.trim().to_string(),
            encrypted_access_token: self
                .vault
                .encrypt(&request.access_token)
                .map_err(map_vault_error)?,
            encrypted_refresh_token: request
                .refresh_token
                .as_deref()
                .filter(|token| !token.trim().is_empty())
                .map(|token| self.vault.encrypt(token))
                .transpose()
                .map_err(map_vault_error)?,
            token_expires_at: request.expires_in_secs.map(|secs| now + Duration::seconds(secs)),
        };

        let stored = self.integrations.insert(&integration).await?;
        info!(integration_id = %stored.id, "integration connected");
        Ok(stored.status())
    }

    /// Secret-free view of every integration.
    pub async fn list(&self) -> Result<Vec<IntegrationStatus>> {
        let integrations = self.integrations.list_all().await?;
        Ok(integrations.iter().map(|integration| integration.status()).collect())
    }
}
