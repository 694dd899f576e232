//! Error types used throughout the sync engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CalSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// The provider reported that the stored grant is no longer valid.
    #[error("Token revoked: {0}")]
    TokenRevoked(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider adapter does not implement the requested capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CalSyncError {
    /// Errors caused by an expired, invalid, or undecryptable credential.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::TokenRevoked(_) | Self::Security(_))
    }

    /// Only an explicit provider-side invalidation deactivates an integration.
    pub fn deactivates_integration(&self) -> bool {
        matches!(self, Self::TokenRevoked(_))
    }

    /// Short, stable summary suitable for `last_sync_error`.
    pub fn summary(&self) -> String {
        const MAX_LEN: usize = 500;
        let text = self.to_string();
        if text.len() <= MAX_LEN {
            return text;
        }
        let mut cut = MAX_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }
}

/// Result type alias for CalSync operations
pub type Result<T> = std::result::Result<T, CalSyncError>;
