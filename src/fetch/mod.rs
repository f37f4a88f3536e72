//! HTTP collaborators
//!
//! A single [`HttpFetcher`] spaces requests with a [`RateLimiter`] and
//! retries transient failures (429, 5xx, timeouts) according to a
//! [`RetryPolicy`]. A 404 is an answer, not a failure.

mod editions;
mod rate_limit;
mod sunnah;

pub use editions::*;
pub use rate_limit::RateLimiter;
pub use sunnah::*;

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Rate-limited, retrying HTTP client
pub struct HttpFetcher {
    client: Client,
    limiter: RateLimiter,
    policy: RetryPolicy,
    requests: AtomicU64,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        min_delay: Duration,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(min_delay),
            policy,
            requests: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            config.min_delay(),
            RetryPolicy::from(&config.retry),
        )
    }

    /// Number of requests sent so far, retries included
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// GET a body as text; `Ok(None)` on 404
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<String>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.wait().await;
            self.requests.fetch_add(1, Ordering::Relaxed);
            debug!("GET {} (attempt {})", url, attempt);

            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let mut retry_after = None;
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(Some(response.text().await?));
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if !is_retryable(status) {
                        return Err(Error::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs);
                    warn!("HTTP {} from {} (attempt {})", status, url, attempt);
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                    warn!("Request to {} failed (attempt {}): {}", url, attempt, e);
                }
                Err(e) => return Err(e.into()),
            }

            if attempt >= self.policy.max_attempts {
                return Err(Error::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                });
            }

            let delay = self.policy.backoff(attempt);
            let delay = retry_after
                .map(|ra| ra.min(self.policy.max_backoff).max(delay))
                .unwrap_or(delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// GET and decode JSON; `Ok(None)` on 404
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Option<T>> {
        match self.get_text(url, headers).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_fetcher(max_attempts: u32) -> HttpFetcher {
    HttpFetcher::new(
        "turath-test",
        Duration::from_secs(5),
        Duration::from_millis(1),
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(10),
        },
    )
    .unwrap()
}
