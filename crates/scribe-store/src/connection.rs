//! `SQLite` connection pool with WAL mode and foreign keys enabled.
//!
//! Uses `r2d2` connection pooling with `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection to ensure WAL mode,
//! foreign keys, and performance pragmas are set.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use scribe_settings::DatabaseSettings;

use crate::errors::{Result, StoreError};

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
    /// Cache size in KiB (default: 8192 = 8 MB).
    pub cache_size_kib: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
            cache_size_kib: 8192,
        }
    }
}

impl From<&DatabaseSettings> for ConnectionConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            pool_size: settings.pool_size,
            busy_timeout_ms: settings.busy_timeout_ms,
            cache_size_kib: settings.cache_size_kib,
        }
    }
}

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
    cache_size_kib: i64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA cache_size = -{};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms, self.cache_size_kib
        ))?;
        Ok(())
    }
}

/// Create an in-memory connection pool (for testing).
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::memory(), config)
}

/// Create a file-backed connection pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), config)
}

fn build_pool(manager: SqliteConnectionManager, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
            cache_size_kib: config.cache_size_kib,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Verify pragmas are set correctly on a connection.
pub fn verify_pragmas(conn: &Connection) -> Result<PragmaState> {
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .map_err(StoreError::Sqlite)?;
    let foreign_keys: i32 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .map_err(StoreError::Sqlite)?;
    Ok(PragmaState {
        journal_mode,
        foreign_keys_enabled: foreign_keys == 1,
    })
}

/// Pragma state for verification.
#[derive(Debug)]
pub struct PragmaState {
    /// Journal mode (should be "wal").
    pub journal_mode: String,
    /// Whether foreign keys are enabled.
    pub foreign_keys_enabled: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
