//! # CalSync API
//!
//! HTTP layer and process entry point.
//!
//! This crate contains:
//! - axum routes for webhooks, manual sync and onboarding
//! - Application context (dependency injection)
//! - Logging setup and health reporting
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

pub use context::AppContext;
pub use error::{ApiError, ApiResult};
pub use routes::{router, AppState};
