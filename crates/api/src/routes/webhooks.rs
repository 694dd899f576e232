//! Push-notification ingress and channel management

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use calsync_domain::{ResourceState, WebhookNotification};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use super::AppState;
use crate::error::{ApiError, ApiResult};

pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
pub const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
pub const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/google", post(google_notification))
        .route("/api/integrations/{id}/webhook", put(register).delete(unregister))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    webhook_id: String,
    expiry: DateTime<Utc>,
}

/// Parse the delivery headers. `None` when the channel id or resource state
/// is missing or empty.
pub fn notification_from_headers(headers: &HeaderMap) -> Option<WebhookNotification> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    Some(WebhookNotification {
        channel_id: header(CHANNEL_ID_HEADER)?,
        resource_state: ResourceState::parse(&header(RESOURCE_STATE_HEADER)?),
        channel_token: header(CHANNEL_TOKEN_HEADER),
        resource_id: header(RESOURCE_ID_HEADER),
    })
}

/// POST /webhooks/google
///
/// Answers 200 for every well-formed delivery, known channel or not. Any
/// sync work happens on the background queue.
async fn google_notification(State(context): State<AppState>, headers: HeaderMap) -> Response {
    let Some(notification) = notification_from_headers(&headers) else {
        return ApiError::BadRequest("missing channel id or resource state header".into())
            .into_response();
    };

    match context.webhooks.handle_notification(&notification).await {
        Ok(outcome) => debug!(channel_id = %notification.channel_id, ?outcome, "notification handled"),
        Err(err) => {
            error!(channel_id = %notification.channel_id, error = %err, "notification handling failed");
        }
    }
    StatusCode::OK.into_response()
}

/// PUT /api/integrations/{id}/webhook
async fn register(
    State(context): State<AppState>,
    Path(integration_id): Path<String>,
) -> ApiResult<Json<WebhookResponse>> {
    let registration = context.webhooks.register(&integration_id).await?;
    Ok(Json(WebhookResponse {
        webhook_id: registration.channel_id,
        expiry: registration.expires_at,
    }))
}

/// DELETE /api/integrations/{id}/webhook
async fn unregister(
    State(context): State<AppState>,
    Path(integration_id): Path<String>,
) -> ApiResult<StatusCode> {
    context.webhooks.unregister(&integration_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
