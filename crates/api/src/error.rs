//! HTTP error responses

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use calsync_domain::CalSyncError;
use serde::Serialize;
use thiserror::Error;

use crate::utils::logging::error_label;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] CalSyncError),

    /// A pass for the integration was already running; the trigger was
    /// folded into its rerun.
    #[error("a sync pass is already running for this integration")]
    SyncInProgress,

    #[error("malformed request body: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(err) => match err {
                CalSyncError::NotFound(_) => StatusCode::NOT_FOUND,
                CalSyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CalSyncError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CalSyncError::Auth(_) | CalSyncError::TokenRevoked(_) => StatusCode::UNAUTHORIZED,
                CalSyncError::Network(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SyncInProgress => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Domain(err) => error_label(err),
            Self::SyncInProgress => "sync_in_progress",
            Self::BadRequest(_) => "invalid_input",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, label = self.label(), "request failed");
        } else {
            tracing::debug!(error = %self, label = self.label(), "request rejected");
        }

        // Internal details stay in the logs.
        let message = match &self {
            Self::Domain(CalSyncError::Database(_) | CalSyncError::Internal(_)) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: self.label(), message })).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
