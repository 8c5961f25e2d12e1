use anyhow::{Context, Result};
use tracing::info;
use trade_app::init_logging;
use trade_binance::BinanceClient;
use trade_config::AppConfig;
use trade_core::{build_price_map, get_ticker_price};

const LOOKUP_SYMBOL: &str = "BTCUSDT";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::load().context("failed to load configuration")?;
    let client = BinanceClient::from_config(&config.binance, &config.retry);

    let prices = client
        .get_ticker_prices()
        .await
        .context("failed to fetch ticker prices")?;

    info!(count = prices.len(), "Fetched ticker prices");
    for ticker in prices.iter().take(5) {
        info!(symbol = %ticker.symbol, price = %ticker.price, "Ticker");
    }

    let price_map = build_price_map(&prices)?;
    let price = get_ticker_price(&price_map, LOOKUP_SYMBOL)
        .with_context(|| format!("no price for {LOOKUP_SYMBOL}"))?;

    println!("{LOOKUP_SYMBOL}: {price}");
    Ok(())
}
