use serde_json::json;
use std::time::Duration;
use trade_binance::{
    signer::hmac_sha256_hex, BinanceClient, Fetcher, HttpFetcher, HttpRequest, RetryPolicy,
    API_KEY_HEADER,
};
use trade_config::Credentials;
use trade_core::{Interval, OrderType, Side, TradeError};
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, Request, ResponseTemplate,
};

const API_KEY: &str = "test-api-key";
const SECRET_KEY: &str = "test-secret-key";

/// Helper: start a mock server and create a signed `BinanceClient` whose base
/// URL points at it, with a fast retry policy.
async fn setup() -> (MockServer, BinanceClient) {
    let mock_server = MockServer::start().await;
    let client = BinanceClient::new(mock_server.uri())
        .with_credentials(Credentials::new(API_KEY, SECRET_KEY))
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));
    (mock_server, client)
}

/// Matches requests whose query ends in `&signature=<hmac of everything before it>`.
fn correctly_signed(request: &Request) -> bool {
    let query = request.url.query().unwrap_or_default();
    match query.rsplit_once("&signature=") {
        Some((payload, signature)) => {
            payload.contains("timestamp=")
                && !query.contains(SECRET_KEY)
                && hmac_sha256_hex(SECRET_KEY, payload) == signature
        }
        None => false,
    }
}

fn has_query_key(request: &Request, key: &str) -> bool {
    request.url.query_pairs().any(|(k, _)| k == key)
}

fn two_klines_json() -> serde_json::Value {
    json!([
        [1700000000000_i64,"1.1","1.5","1.0","1.3","100.0",1700000299999_i64,"130.0",42,"50.0","65.0","0"],
        [1700000300000_i64,"1.3","1.4","1.2","1.25","80.5",1700000599999_i64,"100.6",37,"40.0","50.0","0"]
    ])
}

// ---------------------------------------------------------------------------
// Klines
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_get_klines_decodes_rows() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "ETHUSDT"))
        .and(query_param("interval", "5m"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_klines_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let candles = client.get_klines("ETHUSDT", Interval::M5, 10).await.unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].open_time, 1700000000000);
    assert_eq!(candles[0].open, "1.1");
    assert_eq!(candles[0].high, "1.5");
    assert_eq!(candles[0].low, "1.0");
    assert_eq!(candles[0].close, "1.3");
    assert_eq!(candles[0].volume, "100.0");
    assert_eq!(candles[0].close_time, Some(1700000299999));
    assert_eq!(candles[1].open_time, 1700000300000);
    assert_eq!(candles[1].close, "1.25");
}

#[tokio::test]
async fn test_get_klines_is_public() {
    let mock_server = MockServer::start().await;
    let client = BinanceClient::new(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(|request: &Request| {
            !request.headers.contains_key(API_KEY_HEADER) && !has_query_key(request, "signature")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let candles = client.get_klines("BTCUSDT", Interval::H1, 5).await.unwrap();
    assert!(candles.is_empty());
}

#[tokio::test]
async fn test_get_klines_type_mismatch_is_decode_error() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [1700000000000_i64,"1.1","1.5","1.0","1.3","100.0",1700000299999_i64],
            [1700000300000_i64, 1.3, "1.4","1.2","1.25","80.5",1700000599999_i64]
        ])))
        .mount(&mock_server)
        .await;

    let err = client.get_klines("ETHUSDT", Interval::M5, 2).await.unwrap_err();
    assert!(matches!(err, TradeError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn test_get_klines_api_error_is_not_retried() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client.get_klines("INVALID", Interval::M1, 10).await.unwrap_err();
    assert!(
        matches!(err, TradeError::Api { code: -1121, ref msg } if msg == "Invalid symbol."),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_get_klines_retries_server_errors_then_succeeds() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_klines_json()))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let candles = client.get_klines("ETHUSDT", Interval::M1, 10).await.unwrap();

    assert_eq!(candles.len(), 2);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_get_klines_gives_up_after_max_attempts() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = client.get_klines("ETHUSDT", Interval::D1, 10).await.unwrap_err();

    match err {
        TradeError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                *last,
                TradeError::Http { status: 500, ref text } if text == "Internal Server Error"
            ));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_klines_requires_status_200() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let err = client.get_klines("ETHUSDT", Interval::M15, 10).await.unwrap_err();
    assert!(matches!(err, TradeError::Http { status: 204, .. }), "{err:?}");
}

// ---------------------------------------------------------------------------
// Ticker prices
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_get_ticker_prices() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"symbol": "ETHBTC", "price": "0.05123000"},
            {"symbol": "BTCUSDT", "price": "65000.00"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prices = client.get_ticker_prices().await.unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[1].symbol, "BTCUSDT");
    assert_eq!(prices[1].price, "65000.00");

    let map = trade_core::build_price_map(&prices).unwrap();
    assert_eq!(trade_core::get_ticker_price(&map, "btcusdt").unwrap(), "65000.00");
}

// ---------------------------------------------------------------------------
// Signed endpoints
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_get_account_info_is_signed() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .and(header(API_KEY_HEADER, API_KEY))
        .and(correctly_signed)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "makerCommission": 15,
            "canTrade": true,
            "balances": [
                {"asset": "BTC", "free": "4723846.89208129", "locked": "0.00000000"},
                {"asset": "LTC", "free": "4763368.68006011", "locked": "0.00000000"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let balances = client.get_account_info().await.unwrap();

    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].asset, "BTC");
    assert_eq!(balances[0].free, "4723846.89208129");
    assert_eq!(balances[1].locked, "0.00000000");
}

#[tokio::test]
async fn test_get_account_info_unexpected_shape_is_decode_error() {
    let (mock_server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balances": "none"})))
        .mount(&mock_server)
        .await;

    let err = client.get_account_info().await.unwrap_err();
    assert!(matches!(err, TradeError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn test_signed_endpoint_without_credentials_sends_nothing() {
    let mock_server = MockServer::start().await;
    let client = BinanceClient::new(mock_server.uri());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = client.get_account_info().await.unwrap_err();
    assert!(matches!(err, TradeError::Configuration(_)), "{err:?}");
}

#[tokio::test]
async fn test_get_open_orders_returns_raw_body() {
    let (mock_server, client) = setup().await;

    let body = r#"[{"symbol":"LTCBTC","orderId":1,"price":"0.1","origQty":"1.0","status":"NEW"}]"#;

    Mock::given(method("GET"))
        .and(path("/api/v3/openOrders"))
        .and(query_param("symbol", "LTCBTC"))
        .and(header(API_KEY_HEADER, API_KEY))
        .and(correctly_signed)
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let raw = client.get_open_orders(Some("LTCBTC")).await.unwrap();
    assert_eq!(raw.as_ref(), body.as_bytes());
}

#[tokio::test]
async fn test_create_limit_test_order_sends_price_and_time_in_force() {
    let (mock_server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order/test"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("side", "BUY"))
        .and(query_param("type", "LIMIT"))
        .and(query_param("quantity", "0.001"))
        .and(query_param("price", "90000"))
        .and(query_param("timeInForce", "GTC"))
        .and(header(API_KEY_HEADER, API_KEY))
        .and(correctly_signed)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    client
        .create_test_order("BTCUSDT", Side::Buy, OrderType::Limit, "0.001", "90000")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_market_test_order_omits_price() {
    let (mock_server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order/test"))
        .and(query_param("type", "MARKET"))
        .and(|request: &Request| {
            !has_query_key(request, "price") && !has_query_key(request, "timeInForce")
        })
        .and(correctly_signed)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    client
        .create_test_order("BTCUSDT", Side::Sell, OrderType::Market, "0.001", "90000")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_test_order_rejection_is_api_error() {
    let (mock_server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order/test"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"code": -1013, "msg": "Filter failure: LOT_SIZE"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client
        .create_test_order("BTCUSDT", Side::Buy, OrderType::Limit, "0.0000001", "90000")
        .await
        .unwrap_err();

    assert!(matches!(err, TradeError::Api { code: -1013, .. }), "{err:?}");
}

#[tokio::test]
async fn test_create_test_order_is_not_retried() {
    let (mock_server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order/test"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client
        .create_test_order("BTCUSDT", Side::Buy, OrderType::Market, "0.001", "")
        .await
        .unwrap_err();

    assert!(matches!(err, TradeError::Http { status: 502, .. }), "{err:?}");
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------
#[tokio::test]
async fn test_fetcher_sends_api_key_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header(API_KEY_HEADER, "abc"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = HttpRequest::post(format!("{}/echo", mock_server.uri())).with_api_key("abc");
    let response = HttpFetcher::new().fetch(&request).await.unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body.as_ref(), b"created");
}

#[tokio::test]
async fn test_fetcher_connection_refused_is_transport_error() {
    let request = HttpRequest::get("http://127.0.0.1:1/api/v3/ping");

    let err = HttpFetcher::new().fetch(&request).await.unwrap_err();
    assert!(matches!(err, TradeError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_client_with_custom_http_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"symbol": "ETHUSDT", "price": "3500.10"}])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let client = BinanceClient::new(format!("{}/", mock_server.uri()))
        .with_fetcher(HttpFetcher::with_client(http));

    assert_eq!(client.base_url(), mock_server.uri());

    let prices = client.get_ticker_prices().await.unwrap();
    assert_eq!(prices[0].price, "3500.10");
}
