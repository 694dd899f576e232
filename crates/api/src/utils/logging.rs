use std::time::Duration;

use calsync_domain::CalSyncError;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,calsync=debug";
const FORMAT_VAR: &str = "CALSYNC_LOG_FORMAT";

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info,calsync=debug`.
/// `CALSYNC_LOG_FORMAT=json` switches to line-delimited JSON output.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(FORMAT_VAR).is_ok_and(|value| value.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }
    Ok(())
}

/// Log the outcome of a request handler with structured fields.
///
/// `route` must be a static route template, never a path with ids in it.
#[inline]
pub fn log_request_outcome(route: &'static str, elapsed: Duration, success: bool) {
    let duration_ms = elapsed.as_millis() as u64;

    if success {
        info!(route, duration_ms, "request_success");
    } else {
        warn!(route, duration_ms, "request_failure");
    }
}

/// Convert a `CalSyncError` into a stable label for responses and logs.
#[inline]
pub fn error_label(error: &CalSyncError) -> &'static str {
    match error {
        CalSyncError::Database(_) => "database",
        CalSyncError::Config(_) => "config",
        CalSyncError::Network(_) => "network",
        CalSyncError::Auth(_) => "auth",
        CalSyncError::TokenRevoked(_) => "token_revoked",
        CalSyncError::Security(_) => "security",
        CalSyncError::NotFound(_) => "not_found",
        CalSyncError::InvalidInput(_) => "invalid_input",
        CalSyncError::Unsupported(_) => "unsupported",
        CalSyncError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(error_label(&CalSyncError::TokenRevoked("x".into())), "token_revoked");
        assert_eq!(error_label(&CalSyncError::NotFound("x".into())), "not_found");
        assert_eq!(error_label(&CalSyncError::Unsupported("x".into())), "unsupported");
    }
}
