//! Integration onboarding, manual polling and outbound push

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use calsync_core::{AuthorizationState, ConnectIntegration};
use calsync_domain::{
    EventSync, IntegrationStatus, ProviderKind, PushReport, SyncOptions, SyncRun, UnifiedEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::utils::logging::log_request_outcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/authorizations", post(issue_authorization))
        .route("/api/integrations", get(list_integrations).post(connect_integration))
        .route("/api/integrations/{id}/poll", post(poll))
        .route("/api/integrations/{id}/push", post(push))
        .route(
            "/api/integrations/{id}/events/{event_id}/link",
            post(link_event).delete(unlink_event),
        )
}

#[derive(Debug, Deserialize)]
struct AuthorizationRequest {
    provider: ProviderKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub events: Vec<UnifiedEvent>,
    pub conflicts: Vec<UnifiedEvent>,
    pub synced_at: DateTime<Utc>,
    pub count: usize,
}

/// Parse an optional JSON body; an empty body yields the default.
fn optional_json<T>(body: &Bytes) -> ApiResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

/// POST /api/authorizations
async fn issue_authorization(
    State(context): State<AppState>,
    payload: Result<Json<AuthorizationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthorizationState>)> {
    let Json(request) = payload?;
    let state = context.authorization_states.issue(request.provider, Utc::now());
    Ok((StatusCode::CREATED, Json(state)))
}

/// POST /api/integrations
async fn connect_integration(
    State(context): State<AppState>,
    payload: Result<Json<ConnectIntegration>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IntegrationStatus>)> {
    let Json(request) = payload?;
    let status = context.integrations.connect(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/integrations
async fn list_integrations(
    State(context): State<AppState>,
) -> ApiResult<Json<Vec<IntegrationStatus>>> {
    Ok(Json(context.integrations.list().await?))
}

/// POST /api/integrations/{id}/poll
///
/// Runs one pass inline. A pass already in flight answers 409; the trigger
/// still makes that pass run once more.
async fn poll(
    State(context): State<AppState>,
    Path(integration_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<PollResponse>> {
    let started = Instant::now();
    let options: SyncOptions = optional_json(&body)?;

    let result = context
        .orchestrator
        .run_sync_bounded(&integration_id, options, context.config.sync.pass_timeout())
        .await;
    log_request_outcome("/api/integrations/{id}/poll", started.elapsed(), result.is_ok());

    match result? {
        SyncRun::Completed(report) => Ok(Json(PollResponse {
            count: report.applied_count(),
            events: report.applied,
            conflicts: report.conflicts,
            synced_at: report.synced_at,
        })),
        SyncRun::Coalesced => Err(ApiError::SyncInProgress),
    }
}

/// POST /api/integrations/{id}/push
async fn push(
    State(context): State<AppState>,
    Path(integration_id): Path<String>,
) -> ApiResult<Json<PushReport>> {
    let started = Instant::now();
    let result = context.push.push_local_changes(&integration_id).await;
    log_request_outcome("/api/integrations/{id}/push", started.elapsed(), result.is_ok());
    Ok(Json(result?))
}

/// POST /api/integrations/{id}/events/{event_id}/link
async fn link_event(
    State(context): State<AppState>,
    Path((integration_id, event_id)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<EventSync>)> {
    let row = context.push.queue_event(&event_id, &integration_id).await?;
    Ok((StatusCode::ACCEPTED, Json(row)))
}

/// DELETE /api/integrations/{id}/events/{event_id}/link
async fn unlink_event(
    State(context): State<AppState>,
    Path((integration_id, event_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    context.push.unlink(&event_id, &integration_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
