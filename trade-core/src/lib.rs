pub mod model;
pub mod price;

pub use model::{
    ApiErrorBody, Balance, Candle, Interval, Ohlc, OrderType, Side, TickerPrice,
};
pub use price::{build_price_map, get_ticker_price, PriceMap};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {status}: {text}")]
    Http { status: u16, text: String },

    #[error("API error {code}: {msg}")]
    Api { code: i64, msg: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("all {attempts} attempts failed: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TradeError>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("symbol {0} not found")]
    SymbolNotFound(String),

    #[error("input price list is empty")]
    EmptyPriceList,
}

impl TradeError {
    /// Returns `true` for HTTP failures with a 5xx status, the only errors
    /// worth retrying.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if (500..=599).contains(status))
    }
}

pub type Result<T> = std::result::Result<T, TradeError>;
