//! Pooled SQLite storage primitives
//!
//! An r2d2 pool of rusqlite connections with per-connection pragmas, plus a
//! thin connection wrapper whose methods return [`StorageResult`].

pub mod connection;
pub mod error;
pub mod pool;

pub use connection::{SqliteConnection, SqliteStatement};
pub use error::{StorageError, StorageResult};
pub use pool::{apply_connection_pragmas, SqlitePool, SqlitePoolConfig};
