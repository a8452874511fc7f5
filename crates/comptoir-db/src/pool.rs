//! # Database Handle
//!
//! One SQLite file shared by every admin-api request.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /use ──┐                                                          │
//! │  POST /use ──┼──► SqlitePool (max_connections) ──► comptoir.db (WAL)    │
//! │  POST /stock ┘          │                                               │
//! │                         │  reads   : never wait (WAL snapshot)          │
//! │                         │  writes  : begin_write() = BEGIN IMMEDIATE    │
//! │                         │            one writer at a time, the others   │
//! │                         │            wait up to busy_timeout            │
//! │                         ▼                                               │
//! │               tickets() history() reports() orders()                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A deferred transaction that reads first and writes later cannot be
//! upgraded once another connection has committed in between; SQLite fails it
//! with SQLITE_BUSY_SNAPSHOT instead of waiting. Every read-then-write
//! transaction therefore goes through [`begin_write`], which takes the write
//! lock up front.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::history::HistoryRepository;
use crate::repository::orders::OrderRepository;
use crate::repository::reports::ReportRepository;
use crate::repository::tickets::TicketRepository;

const MEMORY: &str = ":memory:";

/// Where the data lives and how many requests may hold a connection.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits for the lock before failing with `Busy`.
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// A database file, created on first start.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// A private database for one test. Every connection to `:memory:` is a
    /// different database, so the pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(MEMORY),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn is_memory(&self) -> bool {
        self.path == Path::new(MEMORY)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }
}

/// Cheap to clone; hands out repositories over the shared pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", config.path.display(), e)))?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "Database open"
        );
        Ok(Database { pool })
    }

    /// Raw pool, for migration status and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tickets(&self) -> TicketRepository {
        TicketRepository::new(self.pool.clone())
    }

    pub fn history(&self) -> HistoryRepository {
        HistoryRepository::new(self.pool.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Waits for in-flight requests to release their connections.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }
}

/// Opens a transaction holding the write lock from its first statement.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Throwaway database files for tests that need more than one connection.
#[cfg(test)]
pub(crate) mod scratch {
    use std::path::PathBuf;

    pub struct ScratchFile(pub PathBuf);

    impl ScratchFile {
        pub fn new() -> Self {
            ScratchFile(std::env::temp_dir().join(format!("comptoir-{}.db", uuid::Uuid::new_v4())))
        }
    }

    impl Drop for ScratchFile {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut path = self.0.clone().into_os_string();
                path.push(suffix);
                let _ = std::fs::remove_file(path);
            }
        }
    }
}
