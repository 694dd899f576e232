//! Credential vault secret resolution using the system keyring
//!
//! Sources, in order: the configured secret, the keyring entry, the labelled
//! insecure development secret (only with `dev_mode`). With none of these the
//! process refuses to start.

use calsync_common::crypto::CredentialVault;
use calsync_domain::{CalSyncError, Result, VaultConfig};
use keyring::Entry;
use rand::RngCore;
use tracing::{info, warn};

use crate::errors::InfraError;

const SERVICE_NAME: &str = "calsync";
const KEY_NAME: &str = "credential_vault_secret";

/// Where the vault secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Config,
    Keyring,
    InsecureDevDefault,
}

/// Resolves and stores the credential vault secret
pub struct KeyManager {
    service: String,
    key: String,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new(SERVICE_NAME, KEY_NAME)
    }
}

impl KeyManager {
    /// Manager bound to a specific keyring entry.
    pub fn new(service: impl Into<String>, key: impl Into<String>) -> Self {
        Self { service: service.into(), key: key.into() }
    }

    /// Pick the vault secret. `Ok(None)` means "use the dev default".
    ///
    /// # Errors
    /// `CalSyncError::Config` when no secret is available and `dev_mode` is
    /// off.
    pub fn resolve_vault_secret(
        &self,
        config: &VaultConfig,
    ) -> Result<(Option<String>, SecretSource)> {
        if let Some(secret) = config.secret.as_ref().filter(|s| !s.trim().is_empty()) {
            return Ok((Some(secret.clone()), SecretSource::Config));
        }

        match self.read_keyring() {
            Ok(Some(secret)) => return Ok((Some(secret), SecretSource::Keyring)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "keyring unavailable, skipping vault secret lookup"),
        }

        if config.dev_mode {
            return Ok((None, SecretSource::InsecureDevDefault));
        }

        Err(CalSyncError::Config(
            "no credential vault secret configured: set CALSYNC_VAULT_SECRET, store one in the \
             keyring, or enable vault dev_mode"
                .into(),
        ))
    }

    /// Resolve the secret and build a warmed-up vault.
    ///
    /// # Errors
    /// Config errors from resolution; `Security` if key derivation fails.
    pub fn build_vault(&self, config: &VaultConfig) -> Result<CredentialVault> {
        let (secret, source) = self.resolve_vault_secret(config)?;
        let dev_mode = source == SecretSource::InsecureDevDefault;
        let vault = CredentialVault::from_secret_or_dev(secret, dev_mode)
            .map_err(|e| CalSyncError::Config(format!("credential vault: {e}")))?;
        vault.warm_up().map_err(|e| CalSyncError::Security(e.to_string()))?;

        let fingerprint = vault.key_fingerprint().unwrap_or_default();
        info!(source = ?source, fingerprint = %fingerprint, "credential vault ready");
        Ok(vault)
    }

    /// Store `secret` in the keyring entry, replacing any existing value.
    pub fn store_secret(&self, secret: &str) -> Result<()> {
        self.entry()?.set_password(secret).map_err(|e| InfraError::from(e).into())
    }

    /// Generate a random secret and store it.
    pub fn generate_and_store(&self) -> Result<String> {
        let secret = Self::generate_secret();
        self.store_secret(&secret)?;
        Ok(secret)
    }

    /// Delete the stored secret (tokens encrypted with it become unreadable).
    pub fn delete_secret(&self) -> Result<()> {
        self.entry()?.delete_credential().map_err(|e| InfraError::from(e).into())
    }

    fn read_keyring(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(secret) if !secret.trim().is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(InfraError::from(e).into()),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.key).map_err(|e| InfraError::from(e).into())
    }

    /// 32 random bytes, hex encoded.
    fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
