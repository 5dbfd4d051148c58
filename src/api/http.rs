use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2000;

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited HTTP client with retry on transient failures
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct RateLimitedHttp {
    client: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    name: &'static str,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RateLimitedHttp {
    /// Create a client allowing `requests_per_second` requests
    pub fn new(name: &'static str, requests_per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            name,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
        })
    }

    /// Override retry policy (tests use a zero backoff)
    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Wait for the rate limiter without sending anything
    pub async fn throttle(&self) {
        self.rate_limiter.until_ready().await;
    }

    /// GET with retries on network errors, 429 and 5xx
    ///
    /// Other 4xx responses fail immediately.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        for attempt in 1..=self.max_retries {
            self.throttle().await;

            let backoff = self.initial_backoff * 2u32.pow(attempt - 1);

            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if (status.as_u16() == 429 || status.is_server_error())
                        && attempt < self.max_retries
                    {
                        tracing::warn!(
                            "{} returned {}, retrying in {:?} (attempt {}/{})",
                            self.name,
                            status,
                            backoff,
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("{} API error ({}): {}", self.name, status, error_text);
                }
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(
                        "Network error from {}: {}, retrying in {:?} (attempt {}/{})",
                        self.name,
                        e,
                        backoff,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => anyhow::bail!(
                    "Network error from {} after {} attempts: {}",
                    self.name,
                    self.max_retries,
                    e
                ),
            }
        }

        anyhow::bail!("{} request failed after {} attempts", self.name, self.max_retries)
    }
}
