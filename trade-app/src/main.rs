use anyhow::{Context, Result};
use tracing::{info, warn};
use trade_app::{init_logging, sync_ohlc, DEFAULT_INTERVALS, DEFAULT_LIMIT, DEFAULT_SYMBOL};
use trade_binance::BinanceClient;
use trade_config::AppConfig;
use trade_storage::Database;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting OHLC sync");

    let config = AppConfig::load().context("failed to load configuration")?;

    let database = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    database
        .run_migrations()
        .await
        .context("failed to run database migrations")?;

    let client = BinanceClient::from_config(&config.binance, &config.retry);
    let store = database.ohlc();

    let report = sync_ohlc(
        &client,
        &store,
        DEFAULT_SYMBOL,
        &DEFAULT_INTERVALS,
        DEFAULT_LIMIT,
    )
    .await;

    for interval in report.failed_intervals() {
        warn!(symbol = %report.symbol, %interval, "Interval was not synced");
    }

    info!(
        symbol = %report.symbol,
        inserted = report.inserted(),
        skipped = report.skipped(),
        failed = report.failed_inserts(),
        "OHLC sync finished"
    );

    database.close().await;
    Ok(())
}
