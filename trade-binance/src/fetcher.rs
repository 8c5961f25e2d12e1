use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;
use trade_core::{ApiErrorBody, Result, TradeError};

/// Header carrying the API key on authenticated requests.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub api_key: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            api_key: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Issues one request and classifies failures. Never retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// [`Fetcher`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if let Some(api_key) = &request.api_key {
            builder = builder.header(API_KEY_HEADER, api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            method = %request.method,
            status = status.as_u16(),
            bytes = body.len(),
            "received response"
        );

        if status.as_u16() >= 400 {
            return Err(classify_error(status, &body));
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Map a failing response to [`TradeError::Api`] when the body carries an
/// exchange error message, otherwise to [`TradeError::Http`].
pub fn classify_error(status: StatusCode, body: &[u8]) -> TradeError {
    match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { code, msg }) if !msg.is_empty() => TradeError::Api { code, msg },
        _ => TradeError::Http {
            status: status.as_u16(),
            text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        },
    }
}
