//! Rate-limited fetch layer.
//!
//! A [`StatsSource`] performs exactly one request and classifies it. The
//! [`RateLimitedFetcher`] on top of it never gives up on a throttled
//! request: it either waits out the cooldown on its single egress, or (in
//! pooled mode) immediately resubmits so the pool can pick an identity that
//! is not cooling down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chess_core::Line;
use tracing::{error, warn};

use crate::bucket::TraversalBucket;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::explorer::{ExplorerClient, ExplorerQuery, ExplorerResponse, FetchOutcome, QuerySettings};

/// Something that can answer a single explorer query.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn request(&self, query: &ExplorerQuery) -> Result<FetchOutcome, CrawlError>;
}

#[async_trait]
impl StatsSource for ExplorerClient {
    async fn request(&self, query: &ExplorerQuery) -> Result<FetchOutcome, CrawlError> {
        self.send(query).await
    }
}

/// Statistics for a position under a bucket; blocks through throttling.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_stats(
        &self,
        line: &Line,
        bucket: &TraversalBucket,
    ) -> Result<ExplorerResponse, CrawlError>;

    /// Throttle responses seen so far.
    fn throttle_events(&self) -> u64 {
        0
    }
}

/// What to do when the source answers 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottlePolicy {
    /// Sleep for the cooldown, then retry on the same egress.
    WaitOut(Duration),
    /// Retry at once; the source rotates to an egress that is not cooling down.
    Rotate,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub on_throttle: ThrottlePolicy,
    pub transport_delay: Duration,
    pub max_transport_retries: u32,
}

impl RetryPolicy {
    pub fn sequential(config: &CrawlConfig) -> Self {
        Self {
            on_throttle: ThrottlePolicy::WaitOut(config.rate_limit_cooldown),
            transport_delay: config.transport_retry_delay,
            max_transport_retries: config.max_transport_retries,
        }
    }

    pub fn pooled(config: &CrawlConfig) -> Self {
        Self {
            on_throttle: ThrottlePolicy::Rotate,
            ..Self::sequential(config)
        }
    }
}

pub struct RateLimitedFetcher<S> {
    source: S,
    settings: QuerySettings,
    retry: RetryPolicy,
    throttled: AtomicU64,
}

impl<S: StatsSource> RateLimitedFetcher<S> {
    pub fn new(source: S, settings: QuerySettings, retry: RetryPolicy) -> Self {
        Self {
            source,
            settings,
            retry,
            throttled: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Send `query` until it succeeds. Throttling is retried without limit;
    /// a remote error is returned at once; transport failures are retried
    /// up to the configured number of consecutive attempts.
    pub async fn fetch_query(&self, query: &ExplorerQuery) -> Result<ExplorerResponse, CrawlError> {
        let mut transport_failures = 0u32;

        loop {
            match self.source.request(query).await {
                Ok(FetchOutcome::Success(response)) => return Ok(response),
                Ok(FetchOutcome::Throttled) => {
                    transport_failures = 0;
                    self.throttled.fetch_add(1, Ordering::Relaxed);

                    if let ThrottlePolicy::WaitOut(cooldown) = self.retry.on_throttle {
                        warn!(
                            fen = %query.fen,
                            speeds = ?query.speeds,
                            ratings = ?query.ratings,
                            wait_secs = cooldown.as_secs(),
                            "Hit rate limit, waiting before retry"
                        );
                        tokio::time::sleep(cooldown).await;
                    }
                }
                Ok(FetchOutcome::Error { status, body }) => {
                    error!(status, fen = %query.fen, body = %body, "Explorer rejected request");
                    return Err(CrawlError::Remote { status, body });
                }
                Err(CrawlError::Http(e))
                    if !e.is_builder() && transport_failures < self.retry.max_transport_retries =>
                {
                    transport_failures += 1;
                    warn!(
                        error = %e,
                        attempt = transport_failures,
                        fen = %query.fen,
                        "Transport failure, retrying"
                    );
                    tokio::time::sleep(self.retry.transport_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<S: StatsSource> Fetcher for RateLimitedFetcher<S> {
    async fn fetch_stats(
        &self,
        line: &Line,
        bucket: &TraversalBucket,
    ) -> Result<ExplorerResponse, CrawlError> {
        let query = self.settings.query(line, bucket);
        self.fetch_query(&query).await
    }

    fn throttle_events(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
}
