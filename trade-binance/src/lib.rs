//! Binance spot REST access: request signing, a classifying HTTP fetcher,
//! bounded retry on server errors, and the [`BinanceClient`] built on them.

/// HMAC-SHA256 signing of canonical query strings.
pub mod signer;

/// [`Fetcher`] trait and its reqwest implementation.
pub mod fetcher;

/// Fixed-delay retry on 5xx responses.
pub mod retry;

/// Account, order and market data endpoints.
pub mod client;

pub use client::BinanceClient;
pub use fetcher::{Fetcher, HttpFetcher, HttpRequest, HttpResponse, API_KEY_HEADER};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use signer::{sign, QueryParams};
