use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row model for the `trades` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
}

/// A trade that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub symbol: &'static str,
    pub quantity: i64,
    pub price: f64,
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub data_type: String,
    pub notnull: i64,
    pub dflt_value: Option<String>,
    pub pk: i64,
}

/// A single SQLite value, decoded by its runtime storage class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("None"),
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::Real(v) => write!(f, "{v:?}"),
            SqlValue::Text(v) => write_quoted(f, v),
            SqlValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Quote text the way Python's `repr` does: single quotes unless the text
/// holds a single quote and no double quote.
fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    write!(f, "{quote}")?;
    for c in text.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c if c == quote => write!(f, "\\{c}")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "{quote}")
}

/// Result of one executed statement. Rows keep the statement's column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryOutcome {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows rendered as a list of tuples, e.g. `[('AAPL', 12, 101.5), (3,)]`.
    pub fn raw_display(&self) -> String {
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(ToString::to_string).collect();
                if values.len() == 1 {
                    format!("({},)", values[0])
                } else {
                    format!("({})", values.join(", "))
                }
            })
            .collect();
        format!("[{}]", tuples.join(", "))
    }
}
