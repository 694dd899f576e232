//! Adapter lookup by provider kind

use std::sync::Arc;

use calsync_core::{ProviderAdapter, ProviderRegistry};
use calsync_domain::{ProviderKind, ProvidersConfig, Result};

use super::{GoogleCalendarAdapter, NotionDatabaseAdapter};

/// Registry holding one adapter per supported provider
#[derive(Clone)]
pub struct DefaultProviderRegistry {
    google: Arc<dyn ProviderAdapter>,
    notion: Arc<dyn ProviderAdapter>,
}

impl DefaultProviderRegistry {
    pub fn new(google: Arc<dyn ProviderAdapter>, notion: Arc<dyn ProviderAdapter>) -> Self {
        Self { google, notion }
    }

    /// Build the HTTP adapters from provider configuration.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let google = GoogleCalendarAdapter::new(config.google.clone())?;
        let notion = NotionDatabaseAdapter::new(config.notion.clone())?;
        Ok(Self::new(Arc::new(google), Arc::new(notion)))
    }
}

impl ProviderRegistry for DefaultProviderRegistry {
    fn adapter(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>> {
        match kind {
            ProviderKind::Google => Ok(Arc::clone(&self.google)),
            ProviderKind::Notion => Ok(Arc::clone(&self.notion)),
        }
    }
}
