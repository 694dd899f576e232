//! Integration tests for pooled SQLite storage

#![cfg(feature = "platform")]

use calsync_common::storage::{SqlitePool, SqlitePoolConfig, StorageError};
use tempfile::TempDir;

fn pool(dir: &TempDir, max_size: u32) -> SqlitePool {
    let config = SqlitePoolConfig { max_size, ..SqlitePoolConfig::default() };
    SqlitePool::new(&dir.path().join("calsync.db"), config).expect("pool created")
}

/// Data written through one pool is visible to a pool opened later on the
/// same file.
#[test]
fn data_persists_across_pools() {
    let dir = TempDir::new().unwrap();
    {
        let conn = pool(&dir, 2).get_connection().unwrap();
        conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL)").unwrap();
        conn.execute("INSERT INTO kv (k, v) VALUES (?1, ?2)", &[&"a", &"1"]).unwrap();
    }

    let conn = pool(&dir, 2).get_connection().unwrap();
    let v: String = conn.query_row("SELECT v FROM kv WHERE k = 'a'", &[], |r| r.get(0)).unwrap();
    assert_eq!(v, "1");
}

/// Upserts on a unique key leave exactly one row.
#[test]
fn on_conflict_upsert_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let conn = pool(&dir, 1).get_connection().unwrap();
    conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL)").unwrap();

    for value in ["1", "2", "2"] {
        conn.execute(
            "INSERT INTO kv (k, v) VALUES ('a', ?1) ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            &[&value],
        )
        .unwrap();
    }

    let (count, v): (i64, String) =
        conn.query_row("SELECT COUNT(*), MAX(v) FROM kv", &[], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
    assert_eq!((count, v.as_str()), (1, "2"));
}

/// Foreign keys are enforced on pooled connections.
#[test]
fn foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let conn = pool(&dir, 1).get_connection().unwrap();
    conn.execute_batch(
        "CREATE TABLE parent (id TEXT PRIMARY KEY);
         CREATE TABLE child (id TEXT PRIMARY KEY, parent_id TEXT NOT NULL REFERENCES parent(id));",
    )
    .unwrap();

    let err = conn.execute("INSERT INTO child (id, parent_id) VALUES ('c', 'missing')", &[]);
    assert!(matches!(err, Err(StorageError::Rusqlite(_))));
}
