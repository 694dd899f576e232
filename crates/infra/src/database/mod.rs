//! SQLite persistence

pub mod event_repository;
pub mod integration_repository;
pub mod ledger_repository;
pub mod manager;

pub use event_repository::SqliteEventRepository;
pub use integration_repository::SqliteIntegrationRepository;
pub use ledger_repository::SqliteLedgerRepository;
pub use manager::DbManager;
