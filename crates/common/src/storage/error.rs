//! Storage error types

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// SQLite BUSY/LOCKED and pool timeouts clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::InvalidConfig(_) | Self::R2d2(_) => false,
        }
    }

    /// True for `QueryReturnedNoRows`.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::Rusqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StorageError::Connection("refused".into()).to_string(),
            "Database connection error: refused"
        );
        assert_eq!(StorageError::Timeout(5).to_string(), "Connection timeout after 5s");
    }

    #[test]
    fn classification() {
        assert!(StorageError::Timeout(1).is_transient());
        assert!(!StorageError::InvalidConfig("x".into()).is_transient());
        assert!(StorageError::from(rusqlite::Error::QueryReturnedNoRows).is_no_rows());
    }
}
