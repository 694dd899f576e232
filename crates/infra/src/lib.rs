//! # CalSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite repositories and schema migrations
//! - Google Calendar and Notion provider adapters over `reqwest`
//! - The background sync queue worker and cron scheduler
//! - Configuration loading and vault secret resolution
//!
//! ## Architecture
//! - Implements traits defined in `calsync-core`
//! - Contains all "impure" code (database, network, keychain)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod key_manager;
pub mod providers;
pub mod scheduling;
pub mod sync;

pub use database::{
    DbManager, SqliteEventRepository, SqliteIntegrationRepository, SqliteLedgerRepository,
};
pub use errors::InfraError;
pub use http::HttpClient;
pub use key_manager::{KeyManager, SecretSource};
pub use providers::{DefaultProviderRegistry, GoogleCalendarAdapter, NotionDatabaseAdapter};
pub use scheduling::{SchedulerError, SyncScheduler, SyncSchedulerConfig};
pub use sync::{SyncQueueHandle, SyncQueueWorker, SyncQueueWorkerConfig};
