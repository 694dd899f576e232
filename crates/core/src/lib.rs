//! # CalSync Core
//!
//! Sync engine business logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for storage, providers and background dispatch
//! - Provider payload mapping and conflict resolution
//! - Orchestration of inbound passes, outbound pushes and batches
//! - Webhook channel lifecycle and integration onboarding
//!
//! ## Architecture Principles
//! - Depends only on `calsync-domain` and `calsync-common`
//! - No database, HTTP, or platform code
//! - All external effects go through traits

pub mod authorization;
pub mod conflict;
pub mod integration;
pub mod mapping;
pub mod ports;
pub mod provider;
pub mod sync;
pub mod webhook;

pub use authorization::{AuthorizationState, AuthorizationStates};
pub use conflict::{resolve, Resolution};
pub use integration::{ConnectIntegration, IntegrationService};
pub use ports::{EventRepository, IntegrationRepository, LedgerRepository, SyncQueue};
pub use provider::{unsupported, ProviderAdapter, ProviderRegistry};
pub use sync::{
    BatchSync, BatchSyncConfig, BatchSyncError, BatchSyncReportExt, CredentialResolver,
    PushService, SyncOrchestrator,
};
pub use webhook::{RenewalReport, WebhookConfig, WebhookService};
