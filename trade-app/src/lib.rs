//! OHLC synchronisation: pulls klines for a symbol across several intervals
//! and stores them, one interval at a time.

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trade_binance::{BinanceClient, Fetcher};
use trade_core::{Interval, Ohlc};
use trade_storage::OhlcStore;

pub const DEFAULT_SYMBOL: &str = "ETHUSDT";
pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_INTERVALS: [Interval; 5] = [
    Interval::M1,
    Interval::M5,
    Interval::M15,
    Interval::H1,
    Interval::D1,
];

/// Install the `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalOutcome {
    pub interval: Interval,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the klines request itself failed.
    pub error: Option<String>,
}

impl IntervalOutcome {
    fn new(interval: Interval) -> Self {
        Self {
            interval,
            fetched: 0,
            inserted: 0,
            skipped: 0,
            failed: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub symbol: String,
    pub intervals: Vec<IntervalOutcome>,
}

impl SyncReport {
    pub fn inserted(&self) -> usize {
        self.intervals.iter().map(|outcome| outcome.inserted).sum()
    }

    pub fn skipped(&self) -> usize {
        self.intervals.iter().map(|outcome| outcome.skipped).sum()
    }

    pub fn failed_inserts(&self) -> usize {
        self.intervals.iter().map(|outcome| outcome.failed).sum()
    }

    pub fn failed_intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.intervals
            .iter()
            .filter(|outcome| outcome.error.is_some())
            .map(|outcome| outcome.interval)
    }
}

/// Fetch `limit` klines per interval and insert each as an [`Ohlc`] row.
///
/// A failed fetch or insert is logged and skipped; the remaining intervals
/// and rows are still processed.
pub async fn sync_ohlc<F, S>(
    client: &BinanceClient<F>,
    store: &S,
    symbol: &str,
    intervals: &[Interval],
    limit: u32,
) -> SyncReport
where
    F: Fetcher,
    S: OhlcStore + ?Sized,
{
    let mut report = SyncReport {
        symbol: symbol.to_string(),
        intervals: Vec::with_capacity(intervals.len()),
    };

    for &interval in intervals {
        let mut outcome = IntervalOutcome::new(interval);

        let candles = match client.get_klines(symbol, interval, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                error!(%symbol, %interval, error = %e, "Failed to fetch klines");
                outcome.error = Some(e.to_string());
                report.intervals.push(outcome);
                continue;
            }
        };

        outcome.fetched = candles.len();

        for candle in &candles {
            let ohlc = Ohlc::from_candle(symbol, candle);
            match store.insert_ohlc(&ohlc).await {
                Ok(true) => outcome.inserted += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    warn!(
                        %symbol,
                        %interval,
                        timestamp = ohlc.timestamp,
                        error = %e,
                        "Failed to insert OHLC row"
                    );
                    outcome.failed += 1;
                }
            }
        }

        info!(
            %symbol,
            %interval,
            fetched = outcome.fetched,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Interval synced"
        );
        report.intervals.push(outcome);
    }

    report
}
