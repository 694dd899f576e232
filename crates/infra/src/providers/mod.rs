//! Provider adapters
//!
//! One adapter per external calendar system, plus the registry handing them
//! to the core services.

pub mod google;
pub mod notion;
pub mod registry;

use calsync_domain::{CalSyncError, Result};
use url::Url;

pub use google::GoogleCalendarAdapter;
pub use notion::NotionDatabaseAdapter;
pub use registry::DefaultProviderRegistry;

/// Join percent-encoded path segments onto a configured API base.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| CalSyncError::Config(format!("invalid provider api base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| CalSyncError::Config(format!("provider api base cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
