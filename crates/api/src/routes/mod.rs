//! HTTP routes

pub mod health;
pub mod integrations;
pub mod sync;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::context::AppContext;

/// Shared handler state.
pub type AppState = Arc<AppContext>;

/// Full application router with CORS applied.
pub fn router(context: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(webhooks::router())
        .merge(integrations::router())
        .merge(sync::router())
        .with_state(context)
        .layer(cors)
}
