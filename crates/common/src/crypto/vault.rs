//! Credential vault for provider tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under a key derived once from a
//! long-lived secret with Argon2 and a fixed application salt. Each stored
//! secret is a single self-contained string:
//!
//! ```text
//! base64(nonce):base64(tag):base64(ciphertext)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use calsync_common::crypto::CredentialVault;
//!
//! let vault = CredentialVault::from_raw_key([7u8; 32]);
//! let sealed = vault.encrypt("ya29.access-token")?;
//! assert_eq!(vault.decrypt(&sealed)?, "ya29.access-token");
//! # Ok::<(), calsync_common::crypto::VaultError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::OnceCell;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Fixed application salt for key derivation and fingerprints.
pub const VAULT_SALT: &[u8] = b"calsync.credential-vault.v1";

/// Labelled fallback secret, only accepted in development mode.
pub const INSECURE_DEV_SECRET: &str = "calsync-dev-insecure-secret-do-not-use-in-production";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Vault failures.
///
/// `Decryption` deliberately carries no detail: malformed envelopes, bad
/// base64 and failed authentication all look the same to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("credential vault secret is not configured")]
    MissingSecret,

    #[error("credential key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("credential encryption failed: {0}")]
    Encryption(String),

    #[error("credential decryption failed")]
    Decryption,
}

pub type VaultResult<T> = Result<T, VaultError>;

struct DerivedKey {
    cipher: Aes256Gcm,
    fingerprint: String,
}

enum KeySource {
    Secret(String),
    Raw([u8; KEY_LEN]),
}

/// Encrypts, decrypts and fingerprints credential strings.
pub struct CredentialVault {
    source: KeySource,
    key: OnceCell<DerivedKey>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &"[REDACTED]")
            .field("fingerprint", &self.key.get().map(|key| key.fingerprint.as_str()))
            .finish()
    }
}

impl CredentialVault {
    /// Build a vault from a configured secret. The key is derived on first use.
    pub fn new(secret: impl Into<String>) -> VaultResult<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(VaultError::MissingSecret);
        }
        Ok(Self { source: KeySource::Secret(secret), key: OnceCell::new() })
    }

    /// Build a vault from an optional secret, falling back to the labelled
    /// insecure default only when `dev_mode` is set.
    pub fn from_secret_or_dev(secret: Option<String>, dev_mode: bool) -> VaultResult<Self> {
        match secret.filter(|value| !value.trim().is_empty()) {
            Some(secret) => Self::new(secret),
            None if dev_mode => {
                warn!(
                    "credential vault is using the INSECURE development secret; \
                     set a real secret before handling production tokens"
                );
                Self::new(INSECURE_DEV_SECRET)
            }
            None => Err(VaultError::MissingSecret),
        }
    }

    /// Build a vault around an already-derived 32-byte key.
    pub fn from_raw_key(key: [u8; KEY_LEN]) -> Self {
        Self { source: KeySource::Raw(key), key: OnceCell::new() }
    }

    /// Derive the key now instead of on first use, surfacing any failure at
    /// startup.
    pub fn warm_up(&self) -> VaultResult<()> {
        self.derived().map(|_| ())
    }

    /// Seal `plaintext` into a `nonce:tag:ciphertext` envelope.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let key = self.derived()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut sealed = key
            .cipher
            .encrypt(&Nonce::from(nonce), plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext.
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!("{}:{}:{}", BASE64.encode(nonce), BASE64.encode(tag), BASE64.encode(sealed)))
    }

    /// Open an envelope produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, envelope: &str) -> VaultResult<String> {
        let key = self.derived()?;

        let mut parts = envelope.split(':');
        let (Some(nonce), Some(tag), Some(data), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::Decryption);
        };

        let nonce = BASE64.decode(nonce).map_err(|_| VaultError::Decryption)?;
        let tag = BASE64.decode(tag).map_err(|_| VaultError::Decryption)?;
        let mut sealed = BASE64.decode(data).map_err(|_| VaultError::Decryption)?;

        let nonce: [u8; NONCE_LEN] =
            nonce.as_slice().try_into().map_err(|_| VaultError::Decryption)?;
        if tag.len() != TAG_LEN {
            return Err(VaultError::Decryption);
        }
        sealed.extend_from_slice(&tag);

        let plaintext = key
            .cipher
            .decrypt(&Nonce::from(nonce), sealed.as_slice())
            .map_err(|_| VaultError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decryption)
    }

    /// One-way fingerprint of `plaintext`, for change detection and token
    /// comparison without storing the secret.
    pub fn hash(&self, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(VAULT_SALT);
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compare `plaintext` against a stored fingerprint in constant time.
    pub fn verify_hash(&self, plaintext: &str, expected: &str) -> bool {
        let actual = self.hash(plaintext);
        if actual.len() != expected.len() {
            return false;
        }
        actual.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }

    /// Short fingerprint of the derived key, safe to log.
    pub fn key_fingerprint(&self) -> VaultResult<String> {
        self.derived().map(|key| key.fingerprint.clone())
    }

    fn derived(&self) -> VaultResult<&DerivedKey> {
        self.key.get_or_try_init(|| {
            let raw = match &self.source {
                KeySource::Raw(raw) => *raw,
                KeySource::Secret(secret) => derive_key(secret)?,
            };

            let cipher = Aes256Gcm::new_from_slice(&raw)
                .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
            let digest = Sha256::digest(raw);

            Ok(DerivedKey { cipher, fingerprint: hex::encode(&digest[..8]) })
        })
    }
}

fn derive_key(secret: &str) -> VaultResult<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(secret.as_bytes(), VAULT_SALT, &mut key)
        .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
