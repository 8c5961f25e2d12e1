use anyhow::{Context, Result};
use tracing::info;
use trade_app::init_logging;
use trade_binance::BinanceClient;
use trade_config::AppConfig;
use trade_core::{OrderType, Side};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::load().context("failed to load configuration")?;
    // Fail early with the variable names rather than on the first signed call.
    config.binance.credentials()?;

    info!(env = ?config.binance.env, base_url = %config.binance.base_url, "Checking account");

    let client = BinanceClient::from_config(&config.binance, &config.retry);

    let balances = client
        .get_account_info()
        .await
        .context("failed to fetch account info")?;

    for balance in &balances {
        info!(
            asset = %balance.asset,
            free = %balance.free,
            locked = %balance.locked,
            "Balance"
        );
    }

    client
        .create_test_order("BTCUSDT", Side::Buy, OrderType::Limit, "0.001", "90000")
        .await
        .context("test order was rejected")?;

    Ok(())
}
