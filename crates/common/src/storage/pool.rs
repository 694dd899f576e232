//! SQLite connection pool
//!
//! r2d2 pool over `r2d2_sqlite`, applying the same pragmas to every
//! connection it opens.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use super::connection::SqliteConnection;
use super::error::{StorageError, StorageResult};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// How long `get_connection` waits for a free connection
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite lock contention
    pub busy_timeout: Duration,

    /// Enable WAL journal mode
    pub enable_wal: bool,

    /// Enable foreign key constraints
    pub enable_foreign_keys: bool,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// Apply connection-level pragmas.
pub fn apply_connection_pragmas(
    conn: &Connection,
    config: &SqlitePoolConfig,
) -> rusqlite::Result<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
    }
    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");
    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)?;
    conn.busy_timeout(config.busy_timeout)
}

/// Pool of SQLite connections
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Open (creating if needed) the database at `path` and build the pool.
    ///
    /// One connection is acquired up front so that an unusable path fails
    /// here rather than on first query.
    #[instrument(fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        if config.max_size == 0 {
            return Err(StorageError::InvalidConfig("pool size must be at least 1".to_string()));
        }

        let pragma_config = config.clone();
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| apply_connection_pragmas(conn, &pragma_config));

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!(error = %e, "failed to create connection pool");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        pool.get().map_err(|e| {
            StorageError::Connection(format!("Failed to get test connection: {e}"))
        })?;

        info!(max_connections = config.max_size, "sqlite pool created");
        Ok(Self { pool, config })
    }

    /// Acquire a connection, waiting up to the configured timeout.
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let start = std::time::Instant::now();
        match self.pool.get() {
            Ok(conn) => {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "connection acquired");
                Ok(SqliteConnection::new(conn))
            }
            Err(e) if e.to_string().to_lowercase().contains("timed out") => {
                warn!(timeout = ?self.config.connection_timeout, "connection pool timeout");
                Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
            }
            Err(e) => Err(StorageError::Connection(format!("Failed to get connection: {e}"))),
        }
    }

    /// Verify a connection can be acquired and answers a trivial query.
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", &[], |row| row.get::<_, i32>(0))?;
        Ok(())
    }

    /// Configured maximum pool size.
    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    fn pool(dir: &TempDir) -> SqlitePool {
        SqlitePool::new(&dir.path().join("test.db"), SqlitePoolConfig::default()).unwrap()
    }

    #[test]
    fn pragmas_are_applied() {
        let dir = TempDir::new().unwrap();
        let conn = pool(&dir).get_connection().unwrap();

        let journal_mode: String =
            conn.pragma_query_value(None, "journal_mode", |row| row.get(0)).unwrap();
        let foreign_keys: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();

        assert_eq!(journal_mode.to_lowercase(), "wal");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = SqlitePoolConfig { max_size: 0, ..SqlitePoolConfig::default() };
        let result = SqlitePool::new(&dir.path().join("test.db"), config);
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn concurrent_writers_share_pool() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(pool(&dir));
        pool.get_connection()
            .unwrap()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let conn = pool.get_connection().unwrap();
                    conn.execute("INSERT INTO t (v) VALUES (?1)", &[&format!("w{i}")]).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let conn = pool.get_connection().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", &[], |row| row.get(0)).unwrap();
        assert_eq!(count, 4);
        pool.health_check().unwrap();
    }
}
