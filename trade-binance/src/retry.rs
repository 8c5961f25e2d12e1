use crate::fetcher::{Fetcher, HttpRequest, HttpResponse};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use trade_core::{Result, TradeError};

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `request` through `fetcher`, retrying only on 5xx HTTP errors.
///
/// Any other error is returned unchanged after the attempt that produced it.
/// When every attempt hits a 5xx the last one is wrapped in
/// [`TradeError::RetriesExhausted`].
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse>
where
    F: Fetcher + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetcher.fetch(request).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_server_error() => {
                if attempt >= max_attempts {
                    return Err(TradeError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }

                warn!(attempt, max_attempts, %error, "Retrying after server error");
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
