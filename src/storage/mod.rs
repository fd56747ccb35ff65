use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::types::DatabaseConfig;

pub mod executor;
pub mod generator;
pub mod models;

pub use executor::{ExecutionError, ExecutionResult, QueryExecutor};
pub use generator::DataGenerator;

pub type SqlitePool = Pool<Sqlite>;

/// Read-write pool over the trade database, creating the file if needed.
///
/// Used by the data generator and the table views.
pub async fn create_sqlite_pool(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&cfg.url)
        .with_context(|| format!("invalid database url {}", cfg.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    connect(cfg, options).await
}

/// Read-only pool handed to the query executor. SQLite itself refuses writes
/// on these connections. Both pools pin the rollback journal: a read-only
/// connection cannot switch the file into WAL mode.
pub async fn create_read_only_pool(cfg: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&cfg.url)
        .with_context(|| format!("invalid database url {}", cfg.url))?
        .read_only(true)
        .journal_mode(SqliteJournalMode::Delete);
    connect(cfg, options).await
}

async fn connect(cfg: &DatabaseConfig, options: SqliteConnectOptions) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(15))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", cfg.url))?;
    Ok(pool)
}
