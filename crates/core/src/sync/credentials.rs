//! Access-token resolution for sync passes and webhook calls

use std::sync::Arc;

use calsync_common::crypto::{CredentialVault, VaultError};
use calsync_domain::{CalSyncError, CalendarIntegration, Result, StoredTokens};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use crate::ports::IntegrationRepository;
use crate::provider::ProviderAdapter;

/// Vault failures surface as security errors with no detail about which
/// part of the envelope was rejected.
pub fn map_vault_error(err: VaultError) -> CalSyncError {
    CalSyncError::Security(err.to_string())
}

/// Decrypts stored credentials and refreshes them when they are about to
/// expire.
pub struct CredentialResolver {
    vault: Arc<CredentialVault>,
    integrations: Arc<dyn IntegrationRepository>,
    refresh_skew: Duration,
}

impl CredentialResolver {
    pub fn new(
        vault: Arc<CredentialVault>,
        integrations: Arc<dyn IntegrationRepository>,
        refresh_skew: Duration,
    ) -> Self {
        Self { vault, integrations, refresh_skew }
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Plaintext access token usable right now.
    ///
    /// A token inside the refresh window is exchanged through the adapter and
    /// the new credentials are persisted before returning. A token that has
    /// already expired with no refresh token is an `Auth` error.
    #[instrument(skip(self, integration, adapter), fields(integration_id = %integration.id))]
    pub async fn access_token(
        &self,
        integration: &CalendarIntegration,
        adapter: &dyn ProviderAdapter,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let access_token =
            self.vault.decrypt(&integration.encrypted_access_token).map_err(map_vault_error)?;

        if !integration.token_needs_refresh(now, self.refresh_skew) {
            return Ok(access_token);
        }

        let Some(encrypted_refresh) = integration.encrypted_refresh_token.as_deref() else {
            let expired = integration.token_expires_at.is_some_and(|expires_at| expires_at <= now);
            if expired {
                return Err(CalSyncError::Auth(format!(
                    "access token for integration {} expired and no refresh token is stored",
                    integration.id
                )));
            }
            debug!("token inside refresh window but no refresh token; using it as is");
            return Ok(access_token);
        };

        let refresh_token = self.vault.decrypt(encrypted_refresh).map_err(map_vault_error)?;
        let grant = adapter.refresh_access_token(&refresh_token).await.map_err(|err| {
            warn!(error = %err, "token refresh failed");
            err
        })?;

        let tokens = StoredTokens {
            encrypted_access_token: self
                .vault
                .encrypt(&grant.access_token)
                .map_err(map_vault_error)?,
            encrypted_refresh_token: grant
                .refresh_token
                .as_deref()
                .map(|token| self.vault.encrypt(token))
                .transpose()
                .map_err(map_vault_error)?,
            token_expires_at: grant.expires_in_secs.map(|secs| now + Duration::seconds(secs)),
        };
        self.integrations.save_tokens(&integration.id, &tokens).await?;

        info!(
            rotated_refresh = grant.refresh_token.is_some(),
            expires_at = ?tokens.token_expires_at,
            "access token refreshed"
        );
        Ok(grant.access_token)
    }
}
