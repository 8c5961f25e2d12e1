use crate::{Result, TickerPrice, TradeError};
use std::collections::HashMap;

/// Symbol to price lookup, keyed by the exchange's upper-case symbol.
pub type PriceMap = HashMap<String, String>;

pub fn build_price_map(prices: &[TickerPrice]) -> Result<PriceMap> {
    if prices.is_empty() {
        return Err(TradeError::EmptyPriceList);
    }

    Ok(prices
        .iter()
        .map(|ticker| (ticker.symbol.clone(), ticker.price.clone()))
        .collect())
}

/// Look up `symbol` case-insensitively. The error carries the symbol as given.
pub fn get_ticker_price<'a>(prices: &'a PriceMap, symbol: &str) -> Result<&'a str> {
    prices
        .get(&symbol.to_uppercase())
        .map(String::as_str)
        .ok_or_else(|| TradeError::SymbolNotFound(symbol.to_string()))
}
