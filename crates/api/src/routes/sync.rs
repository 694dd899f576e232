//! Batch sync triggers

use std::time::Instant;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use calsync_core::BatchSyncReportExt;
use calsync_domain::BatchSyncReport;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::error::ApiResult;
use crate::utils::logging::log_request_outcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/all", post(sync_all))
        .route("/api/sync/all/cancel", post(cancel_all))
}

/// Batch report plus the cause of the first failure, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAllResponse {
    #[serde(flatten)]
    pub report: BatchSyncReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/sync/all
///
/// Per-integration failures never fail the request; they are listed in the
/// report.
async fn sync_all(State(context): State<AppState>) -> ApiResult<Json<SyncAllResponse>> {
    let started = Instant::now();
    let result = context.batch.run().await;
    log_request_outcome("/api/sync/all", started.elapsed(), result.is_ok());

    let response = match result?.into_result() {
        Ok(report) => SyncAllResponse { report, first_error: None },
        Err(failure) => {
            warn!(error = %failure, "sync-all finished with failures");
            SyncAllResponse {
                first_error: failure.first_cause().map(str::to_string),
                report: failure.report,
            }
        }
    };
    Ok(Json(response))
}

/// POST /api/sync/all/cancel
async fn cancel_all(State(context): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse { cancelled: context.batch.cancel_all() })
}
