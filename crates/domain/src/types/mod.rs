//! Domain types and models

pub mod event;
pub mod event_sync;
pub mod integration;
pub mod provider_items;
pub mod sync;
pub mod unified;
pub mod webhook;

pub use event::{Event, OutboundEvent};
pub use event_sync::{EventSync, LedgerUpsert, SyncStatus};
pub use integration::{
    CalendarIntegration, IntegrationStatus, NewIntegration, ProviderCapabilities, ProviderKind,
    StoredTokens, WebhookChannel,
};
pub use provider_items::{
    GoogleEventDateTime, GoogleEventItem, GoogleExtendedProperties, NotionDate, NotionPage,
    NotionProperty, NotionRichText, RawProviderItem, RemoteWrite, TokenGrant,
};
pub use sync::{
    BatchSyncReport, IntegrationOutcome, OutcomeStatus, PushFailure, PushReport, SyncOptions,
    SyncReport, SyncRequest, SyncRun, SyncTrigger,
};
pub use unified::{
    encode_local_id, UnifiedEvent, UnifiedEventDraft, DEFAULT_DURATION_MINUTES, UNTITLED_EVENT,
};
pub use webhook::{
    IgnoreReason, NotificationOutcome, ResourceState, WebhookNotification, WebhookRegistration,
    WebhookRequest,
};
