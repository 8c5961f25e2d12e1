use crate::{
    fetcher::{Fetcher, HttpFetcher, HttpRequest},
    retry::{fetch_with_retry, RetryPolicy},
    signer::{encode_query, sign, QueryParams},
};
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use trade_config::{BinanceConfig, Credentials, RetryConfig};
use trade_core::{Balance, Candle, Interval, OrderType, Result, Side, TickerPrice, TradeError};

const ACCOUNT_PATH: &str = "/api/v3/account";
const OPEN_ORDERS_PATH: &str = "/api/v3/openOrders";
const KLINES_PATH: &str = "/api/v3/klines";
const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";
const TEST_ORDER_PATH: &str = "/api/v3/order/test";

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

/// Binance spot REST client.
///
/// Public endpoints work without credentials; signed endpoints fail with
/// [`TradeError::Configuration`] when none were supplied. GET requests go
/// through [`fetch_with_retry`]; order placement is attempted once.
#[derive(Debug, Clone)]
pub struct BinanceClient<F = HttpFetcher> {
    base_url: String,
    credentials: Option<Credentials>,
    fetcher: F,
    retry: RetryPolicy,
}

impl BinanceClient<HttpFetcher> {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            fetcher: HttpFetcher::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(binance: &BinanceConfig, retry: &RetryConfig) -> Self {
        let client = Self::new(binance.base_url.clone())
            .with_retry_policy(RetryPolicy::new(retry.max_attempts, retry.delay));

        match &binance.credentials {
            Some(credentials) => client.with_credentials(credentials.clone()),
            None => client,
        }
    }
}

impl<F> BinanceClient<F> {
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetcher<G>(self, fetcher: G) -> BinanceClient<G> {
        BinanceClient {
            base_url: self.base_url,
            credentials: self.credentials,
            fetcher,
            retry: self.retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn public_request(&self, path: &str, params: &QueryParams) -> HttpRequest {
        if params.is_empty() {
            HttpRequest::get(format!("{}{}", self.base_url, path))
        } else {
            HttpRequest::get(format!("{}{}?{}", self.base_url, path, encode_query(params)))
        }
    }

    /// Build a signed request: `timestamp` is added, the canonical query is
    /// signed and `signature` is appended last.
    fn signed_request(
        &self,
        method: Method,
        path: &str,
        mut params: QueryParams,
    ) -> Result<HttpRequest> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            TradeError::Configuration(format!("{path} requires API credentials"))
        })?;

        params.insert("timestamp", Utc::now().timestamp_millis().to_string());
        let signature = sign(&credentials.secret_key, &params);

        Ok(HttpRequest {
            method,
            url: format!(
                "{}{}?{}&signature={}",
                self.base_url,
                path,
                encode_query(&params),
                signature
            ),
            api_key: Some(credentials.api_key.clone()),
        })
    }
}

impl<F> BinanceClient<F>
where
    F: Fetcher,
{
    /// `GET /api/v3/account`, returning the account balances.
    pub async fn get_account_info(&self) -> Result<Vec<Balance>> {
        let request = self.signed_request(Method::GET, ACCOUNT_PATH, QueryParams::new())?;
        let response = fetch_with_retry(&self.fetcher, &request, &self.retry).await?;

        let account: AccountResponse = serde_json::from_slice(&response.body)?;
        debug!(balances = account.balances.len(), "fetched account info");
        Ok(account.balances)
    }

    /// `GET /api/v3/openOrders`, returning the raw JSON body.
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Bytes> {
        let mut params = QueryParams::new();
        if let Some(symbol) = symbol {
            params.insert("symbol", symbol.to_string());
        }

        let request = self.signed_request(Method::GET, OPEN_ORDERS_PATH, params)?;
        let response = fetch_with_retry(&self.fetcher, &request, &self.retry).await?;
        Ok(response.body)
    }

    /// `GET /api/v3/klines`. Every row must decode, otherwise the whole call
    /// fails with [`TradeError::Decode`].
    #[tracing::instrument(
        skip_all,
        fields(endpoint = KLINES_PATH, symbol = %symbol, interval = %interval, limit = limit)
    )]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let params = QueryParams::from([
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ]);

        let request = self.public_request(KLINES_PATH, &params);
        let response = fetch_with_retry(&self.fetcher, &request, &self.retry).await?;

        if response.status != 200 {
            return Err(TradeError::Http {
                status: response.status,
                text: StatusCode::from_u16(response.status)
                    .ok()
                    .and_then(|status| status.canonical_reason())
                    .unwrap_or("Unexpected status")
                    .to_string(),
            });
        }

        let candles: Vec<Candle> = serde_json::from_slice(&response.body)?;
        debug!(count = candles.len(), "fetched klines");
        Ok(candles)
    }

    /// `GET /api/v3/ticker/price` for every symbol.
    pub async fn get_ticker_prices(&self) -> Result<Vec<TickerPrice>> {
        let request = self.public_request(TICKER_PRICE_PATH, &QueryParams::new());
        let response = fetch_with_retry(&self.fetcher, &request, &self.retry).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// `POST /api/v3/order/test`. `price` and `timeInForce=GTC` are only sent
    /// for [`OrderType::Limit`].
    pub async fn create_test_order(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        quantity: &str,
        price: &str,
    ) -> Result<()> {
        let mut params = QueryParams::from([
            ("symbol", symbol.to_string()),
            ("side", side.to_string()),
            ("type", order_type.to_string()),
            ("quantity", quantity.to_string()),
        ]);

        if order_type == OrderType::Limit {
            params.insert("price", price.to_string());
            params.insert("timeInForce", "GTC".to_string());
        }

        let request = self.signed_request(Method::POST, TEST_ORDER_PATH, params)?;
        self.fetcher.fetch(&request).await?;

        info!(%symbol, %side, %order_type, %quantity, "Test order accepted");
        Ok(())
    }
}
