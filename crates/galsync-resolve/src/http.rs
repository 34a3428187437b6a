use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{ResolveError, Result};

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// `reqwest` client that spaces requests, retries transport failures with
/// exponential backoff and honours `Retry-After` on 429.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Shrink retry waits, for tests against a local mock server.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: HeaderMap) -> Result<T> {
        let text = self
            .send_with_retry(url, || self.client.get(url).headers(headers.clone()))
            .await?;
        serde_json::from_str(&text).map_err(|e| ResolveError::Parse(e.to_string()))
    }

    pub async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<R> {
        let text = self
            .send_with_retry(url, || {
                self.client.post(url).headers(headers.clone()).json(body)
            })
            .await?;
        serde_json::from_str(&text).map_err(|e| ResolveError::Parse(e.to_string()))
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            match build().send().await {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(ResolveError::RateLimit(url.to_string(), wait));
                    }
                    debug!(url, wait, "rate limited, retrying");
                    sleep(self.backoff_unit * wait as u32).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == StatusCode::UNAUTHORIZED || r.status() == StatusCode::FORBIDDEN => {
                    return Err(ResolveError::Auth(url.to_string()));
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ResolveError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {body}"),
                    ));
                }
                Ok(r) => return r.text().await.map_err(ResolveError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ResolveError::Http(e));
                    }
                    let backoff = 2u32.pow(attempt);
                    debug!(url, attempt, error = %e, "request failed, backing off");
                    sleep(self.backoff_unit * backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
