use crate::TradeError;
use serde::{de, Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Binance REST API error payload.
///
/// Returned alongside a failing HTTP status, e.g.:
/// ```json
/// { "code": -1121, "msg": "Invalid symbol." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

/// One kline as returned by `GET /api/v3/klines`.
///
/// Prices and volume stay decimal strings, exactly as the exchange sent them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub close_time: Option<i64>,
}

impl<'de> Deserialize<'de> for Candle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct CandleVisitor;

        impl<'de> de::Visitor<'de> for CandleVisitor {
            type Value = Candle;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a Binance kline array with at least 6 elements")
            }

            fn visit_seq<SeqAccessor>(
                self,
                mut seq: SeqAccessor,
            ) -> Result<Self::Value, SeqAccessor::Error>
            where
                SeqAccessor: de::SeqAccess<'de>,
            {
                // [0] open_time (i64 ms)
                // [1..=5] open, high, low, close, volume (String)
                // [6] close_time (i64 ms, optional)
                // [7..] quote volume, trade count, taker volumes (ignored)
                let open_time = extract_next(&mut seq, "open_time")?;
                let open = extract_next(&mut seq, "open")?;
                let high = extract_next(&mut seq, "high")?;
                let low = extract_next(&mut seq, "low")?;
                let close = extract_next(&mut seq, "close")?;
                let volume = extract_next(&mut seq, "volume")?;
                let close_time = seq.next_element::<i64>()?;

                while seq.next_element::<de::IgnoredAny>()?.is_some() {}

                Ok(Candle {
                    open_time,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    close_time,
                })
            }
        }

        deserializer.deserialize_seq(CandleVisitor)
    }
}

fn extract_next<'de, SeqAccessor, Target>(
    seq: &mut SeqAccessor,
    field: &'static str,
) -> Result<Target, SeqAccessor::Error>
where
    SeqAccessor: de::SeqAccess<'de>,
    Target: Deserialize<'de>,
{
    seq.next_element::<Target>()?
        .ok_or_else(|| de::Error::missing_field(field))
}

/// Row shape of the `ohlc` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ohlc {
    pub symbol: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    /// Candle open time, epoch milliseconds.
    pub timestamp: i64,
}

impl Ohlc {
    pub fn from_candle(symbol: impl Into<String>, candle: &Candle) -> Self {
        Self {
            symbol: symbol.into(),
            open: candle.open.clone(),
            high: candle.high.clone(),
            low: candle.low.clone(),
            close: candle.close.clone(),
            volume: candle.volume.clone(),
            timestamp: candle.open_time,
        }
    }
}

/// Kline bucket sizes accepted by the Binance spot API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    Month1,
}

impl Interval {
    pub const ALL: [Interval; 15] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::D3,
        Interval::W1,
        Interval::Month1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::Month1 => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| TradeError::InvalidInterval(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => f.write_str("LIMIT"),
            OrderType::Market => f.write_str("MARKET"),
        }
    }
}
