//! Conversions from external infrastructure errors into domain errors.

use calsync_common::storage::StorageError;
use calsync_domain::CalSyncError;
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalSyncError);

impl From<InfraError> for CalSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalSyncError> for InfraError {
    fn from(value: CalSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoCalSyncError {
    fn into_calsync(self) -> CalSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalSyncError for SqlError {
    fn into_calsync(self) -> CalSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => CalSyncError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        CalSyncError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_UNIQUE / SQLITE_CONSTRAINT_PRIMARYKEY
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CalSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CalSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => CalSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                CalSyncError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::InvalidPath(path) => CalSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CalSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → CalSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalSyncError for StorageError {
    fn into_calsync(self) -> CalSyncError {
        match self {
            StorageError::Rusqlite(err) => err.into_calsync(),
            other => CalSyncError::Database(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → CalSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalSyncError for KeyringError {
    fn into_calsync(self) -> CalSyncError {
        match self {
            KeyringError::NoEntry => CalSyncError::NotFound("keychain entry not found".into()),
            KeyringError::BadEncoding(_) => {
                CalSyncError::Security("secret in keychain is not valid UTF-8".into())
            }
            KeyringError::PlatformFailure(err) => {
                CalSyncError::Security(format!("keychain platform error: {err}"))
            }
            KeyringError::NoStorageAccess(err) => {
                CalSyncError::Security(format!("unable to access secure storage: {err}"))
            }
            other => CalSyncError::Security(other.to_string()),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalSyncError for HttpError {
    fn into_calsync(self) -> CalSyncError {
        if self.is_timeout() {
            return CalSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CalSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status, None);
        }

        if self.is_decode() {
            return CalSyncError::Network(format!("malformed provider response: {self}"));
        }

        CalSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_calsync())
    }
}

/// Map a non-success HTTP status, optionally carrying the provider's body.
pub(crate) fn status_error(status: reqwest::StatusCode, detail: Option<&str>) -> CalSyncError {
    let code = status.as_u16();
    let mut message =
        format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
    if let Some(detail) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        message.push_str(": ");
        message.push_str(detail);
    }

    match code {
        401 | 403 => CalSyncError::Auth(message),
        404 => CalSyncError::NotFound(message),
        429 => CalSyncError::Network(message),
        400..=499 => CalSyncError::InvalidInput(message),
        _ => CalSyncError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use tokio::runtime::Runtime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn http_error(status: StatusCode) -> HttpError {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err()
        })
    }

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: CalSyncError = InfraError::from(err).into();
        match mapped {
            CalSyncError::Database(msg) => assert!(msg.contains("busy")),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn sqlite_unique_violation_is_named() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: event_sync.integration_id".into()),
        );

        let mapped: CalSyncError = InfraError::from(err).into();
        assert_eq!(mapped, CalSyncError::Database("unique constraint violation".into()));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: CalSyncError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, CalSyncError::NotFound(_)));
    }

    #[test]
    fn storage_error_unwraps_sqlite_cause() {
        let mapped: CalSyncError =
            InfraError::from(StorageError::Rusqlite(SqlError::QueryReturnedNoRows)).into();
        assert!(matches!(mapped, CalSyncError::NotFound(_)));

        let mapped: CalSyncError = InfraError::from(StorageError::Timeout(5)).into();
        assert!(matches!(mapped, CalSyncError::Database(msg) if msg.contains("5s")));
    }

    #[test]
    fn keyring_no_entry_maps_to_not_found() {
        let mapped: CalSyncError = InfraError::from(KeyringError::NoEntry).into();
        match mapped {
            CalSyncError::NotFound(msg) => assert!(msg.contains("keychain")),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn http_status_401_maps_to_auth_error() {
        let mapped: CalSyncError = InfraError::from(http_error(StatusCode::UNAUTHORIZED)).into();
        match mapped {
            CalSyncError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn http_status_classes() {
        let not_found: CalSyncError = InfraError::from(http_error(StatusCode::NOT_FOUND)).into();
        let limited: CalSyncError =
            InfraError::from(http_error(StatusCode::TOO_MANY_REQUESTS)).into();
        let bad: CalSyncError = InfraError::from(http_error(StatusCode::BAD_REQUEST)).into();
        let unavailable: CalSyncError =
            InfraError::from(http_error(StatusCode::SERVICE_UNAVAILABLE)).into();

        assert!(matches!(not_found, CalSyncError::NotFound(_)));
        assert!(matches!(limited, CalSyncError::Network(_)));
        assert!(matches!(bad, CalSyncError::InvalidInput(_)));
        assert!(matches!(unavailable, CalSyncError::Network(_)));
    }

    #[test]
    fn status_error_appends_detail() {
        let err = status_error(StatusCode::FORBIDDEN, Some("  insufficient scope "));
        assert_eq!(err, CalSyncError::Auth("HTTP 403 Forbidden: insufficient scope".into()));
    }
}
