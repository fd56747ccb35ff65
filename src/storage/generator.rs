use rand::Rng;
use sqlx::{query, query_as};
use tracing::info;

use super::models::{ColumnInfo, NewTrade, TradeRow};
use super::SqlitePool;

pub const SYMBOLS: [&str; 5] = ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"];
pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 100;
pub const MIN_PRICE: f64 = 50.0;
pub const MAX_PRICE: f64 = 2000.0;

/// Creates and populates the synthetic `trades` table.
///
/// The schema is:
/// ```sql
/// CREATE TABLE IF NOT EXISTS trades (
///   id       INTEGER PRIMARY KEY AUTOINCREMENT,
///   symbol   TEXT    NOT NULL,
///   quantity INTEGER NOT NULL,
///   price    REAL    NOT NULL
/// );
/// ```
pub struct DataGenerator {
    pool: SqlitePool,
}

impl DataGenerator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_table(&self) -> anyhow::Result<()> {
        query(
            "CREATE TABLE IF NOT EXISTS trades ( \
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 symbol TEXT NOT NULL, \
                 quantity INTEGER NOT NULL, \
                 price REAL NOT NULL \
             )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert `count` random trades. Returns the number of rows written.
    pub async fn generate_records(&self, count: usize) -> anyhow::Result<usize> {
        let trades = random_trades(&mut rand::rng(), count);
        self.insert_trades(&trades).await
    }

    /// Same as [`generate_records`](Self::generate_records) with a caller-supplied RNG.
    pub async fn generate_records_with<R: Rng>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> anyhow::Result<usize> {
        let trades = random_trades(rng, count);
        self.insert_trades(&trades).await
    }

    async fn insert_trades(&self, trades: &[NewTrade]) -> anyhow::Result<usize> {
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            query("INSERT INTO trades (symbol, quantity, price) VALUES (?, ?, ?)")
                .bind(trade.symbol)
                .bind(trade.quantity)
                .bind(trade.price)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(target: "storage", inserted = trades.len(), "trade records generated");
        Ok(trades.len())
    }

    pub async fn table_schema(&self) -> anyhow::Result<Vec<ColumnInfo>> {
        let columns = query_as::<_, ColumnInfo>(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info('trades') ORDER BY cid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    pub async fn all_trades(&self) -> anyhow::Result<Vec<TradeRow>> {
        let rows = query_as::<_, TradeRow>(
            "SELECT id, symbol, quantity, price FROM trades ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Draw `count` trades: symbol from [`SYMBOLS`], quantity in 1..=100 and a
/// price in 50.00..=2000.00 rounded to cents.
pub fn random_trades<R: Rng>(rng: &mut R, count: usize) -> Vec<NewTrade> {
    (0..count)
        .map(|_| {
            let symbol = SYMBOLS[rng.random_range(0..SYMBOLS.len())];
            let quantity = rng.random_range(MIN_QUANTITY..=MAX_QUANTITY);
            let raw_price: f64 = rng.random_range(MIN_PRICE..=MAX_PRICE);
            let price = ((raw_price * 100.0).round() / 100.0).clamp(MIN_PRICE, MAX_PRICE);
            NewTrade {
                symbol,
                quantity,
                price,
            }
        })
        .collect()
}
