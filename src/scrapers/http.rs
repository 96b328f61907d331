//! HTTP fetching with exponential backoff retry logic.
//!
//! Every HTTP-backed adapter talks to the network through [`FetchText`], so a
//! retry policy can be layered on without the adapters knowing about it.
//!
//! # Architecture
//!
//! - [`FetchText`]: Core trait defining an async GET returning the body text
//! - [`ReqwestFetcher`]: `reqwest`-backed implementation that rejects non-2xx statuses
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchText` implementation
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (timeouts, connection errors, 429, 5xx)
//! - Exponential backoff starting at `base_delay`, capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::CollectionConfig;
use crate::error::AdapterError;
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for fetching a URL as text.
pub trait FetchText {
    /// GET `url` and return the response body.
    async fn fetch_text(&self, url: &str) -> Result<String, AdapterError>;
}

/// Plain `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str, timeout: StdDuration) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchText for ReqwestFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_text(&self, url: &str) -> Result<String, AdapterError> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchText`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
#[derive(Clone)]
pub struct RetryFetch<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchText,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchText for RetryFetch<T>
where
    T: FetchText,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_text(&self, url: &str) -> Result<String, AdapterError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The client every HTTP-backed adapter shares.
pub type HttpClient = RetryFetch<ReqwestFetcher>;

/// Build the shared client from collection settings.
pub fn build_client(settings: &CollectionConfig) -> Result<HttpClient, AdapterError> {
    let fetcher = ReqwestFetcher::new(&settings.user_agent, settings.request_timeout())?;
    Ok(RetryFetch::new(
        fetcher,
        settings.max_retries,
        StdDuration::from_secs(1),
    ))
}
