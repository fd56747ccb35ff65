use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{debug, warn};

use crate::sql_guard::{validate_read_only, GuardError};

use super::models::{QueryOutcome, SqlValue};
use super::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("statement rejected: {0}")]
    Rejected(#[from] GuardError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Runs generated SQL against the trade database.
///
/// Statements must pass [`validate_read_only`] first. Failures are always
/// returned as typed errors; choosing what to show the user is left to the
/// caller.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: SqlitePool,
}

impl QueryExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn execute(&self, sql: &str) -> ExecutionResult<QueryOutcome> {
        let statement = validate_read_only(sql).map_err(|reason| {
            warn!(target: "storage", %reason, "generated statement rejected");
            reason
        })?;

        let rows = sqlx::query(&statement).fetch_all(&self.pool).await?;
        let outcome = rows_to_outcome(&rows)?;

        debug!(
            target: "storage",
            columns = outcome.columns.len(),
            rows = outcome.row_count(),
            "statement executed"
        );
        Ok(outcome)
    }
}

fn rows_to_outcome(rows: &[SqliteRow]) -> Result<QueryOutcome, sqlx::Error> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(decode_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryOutcome { columns, rows })
}

fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let storage_class = raw.type_info().name().to_string();
    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" | "NUMERIC" => SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}
