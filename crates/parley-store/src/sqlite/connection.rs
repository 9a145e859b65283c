//! Connection pool construction and schema migrations.

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::debug;

use crate::errors::Result;

/// Pooled SQLite connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
/// One checked-out connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
}

/// Open (or create) a database file and run migrations.
pub fn open_pool(path: &Path) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::errors::StoreError::Durable(e.to_string()))?;
    }
    let manager = SqliteConnectionManager::file(path).with_init(init_connection);
    let pool = r2d2::Pool::builder()
        .connection_timeout(Duration::from_secs(5))
        .build(manager)?;
    {
        let conn = pool.get()?;
        run_migrations(&conn)?;
    }
    debug!(path = %path.display(), "sqlite pool opened");
    Ok(pool)
}

/// In-memory database for tests and ephemeral deployments.
///
/// Pool size 1: every checkout sees the same in-memory database.
pub fn new_in_memory() -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    {
        let conn = pool.get()?;
        run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Create the schema if it does not exist. Idempotent.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contexts (
             conversation_id TEXT PRIMARY KEY,
             user_id         TEXT NOT NULL,
             channel         TEXT NOT NULL,
             payload         TEXT NOT NULL,
             updated_at      TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS call_records (
             id              TEXT PRIMARY KEY,
             call_id         TEXT NOT NULL,
             conversation_id TEXT NOT NULL,
             duration_ms     INTEGER NOT NULL,
             transcript_ref  TEXT,
             audio_ref       TEXT,
             created_at      TEXT NOT NULL
         );

         CREATE INDEX IF NOT EXISTS idx_call_records_conversation
             ON call_records(conversation_id, created_at);",
    )?;
    Ok(())
}
