//! Credential encryption shared by the sync engine.

pub mod vault;

pub use vault::{CredentialVault, VaultError, VaultResult, INSECURE_DEV_SECRET, VAULT_SALT};
