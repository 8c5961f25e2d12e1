//! Postgres persistence for OHLC candles.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};
use trade_config::DatabaseConfig;
use trade_core::{Ohlc, Result};

/// Owns the connection pool and the schema migrations.
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(config.url()?)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("Database connection established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations completed");
        Ok(())
    }

    pub fn ohlc(&self) -> OhlcQueries {
        OhlcQueries::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}

/// Sink for fetched candles.
#[async_trait]
pub trait OhlcStore: Send + Sync {
    /// Insert one row. Returns `false` when a row with the same
    /// `(symbol, timestamp)` already exists, leaving it untouched.
    async fn insert_ohlc(&self, ohlc: &Ohlc) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct OhlcQueries {
    pool: PgPool,
}

impl OhlcQueries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_ohlc(&self, symbol: &str, timestamp: i64) -> Result<Option<Ohlc>> {
        let row = sqlx::query(
            r#"
            SELECT symbol, open::text AS open, high::text AS high, low::text AS low,
                   close::text AS close, volume::text AS volume, timestamp
            FROM ohlc
            WHERE symbol = $1 AND timestamp = $2
            "#,
        )
        .bind(symbol)
        .bind(timestamp)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Ohlc {
            symbol: row.try_get("symbol")?,
            open: row.try_get("open")?,
            high: row.try_get("high")?,
            low: row.try_get("low")?,
            close: row.try_get("close")?,
            volume: row.try_get("volume")?,
            timestamp: row.try_get("timestamp")?,
        }))
    }

    pub async fn count_ohlc(&self, symbol: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ohlc WHERE symbol = $1")
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl OhlcStore for OhlcQueries {
    async fn insert_ohlc(&self, ohlc: &Ohlc) -> Result<bool> {
        // Decimal strings go in as text and are parsed by Postgres.
        let result = sqlx::query(
            r#"
            INSERT INTO ohlc (symbol, open, high, low, close, volume, timestamp)
            VALUES ($1, $2::numeric, $3::numeric, $4::numeric, $5::numeric, $6::numeric, $7)
            ON CONFLICT (symbol, timestamp) DO NOTHING
            "#,
        )
        .bind(&ohlc.symbol)
        .bind(&ohlc.open)
        .bind(&ohlc.high)
        .bind(&ohlc.low)
        .bind(&ohlc.close)
        .bind(&ohlc.volume)
        .bind(ohlc.timestamp)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(symbol = %ohlc.symbol, timestamp = ohlc.timestamp, inserted, "insert_ohlc");
        Ok(inserted)
    }
}
