//! Proxy pool scheduler for pooled mode.
//!
//! Each egress identity has its own cooldown clock, started whenever a
//! request through it is throttled. A semaphore caps the number of requests
//! in flight across the whole pool; the identity table sits behind a mutex
//! that is only held while claiming or releasing an identity, never across
//! I/O.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::explorer::{ExplorerClient, ExplorerQuery, FetchOutcome};
use crate::fetcher::StatsSource;

/// A named outbound path with its own rate-limit budget.
pub struct ProxyIdentity {
    pub name: String,
    pub client: ExplorerClient,
}

impl ProxyIdentity {
    pub fn new(name: impl Into<String>, client: ExplorerClient) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    /// How long an identity rests after a 429
    pub cooldown: Duration,
    /// Ceiling on concurrent requests across all identities
    pub max_in_flight: usize,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl PoolSettings {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            cooldown: config.rate_limit_cooldown,
            max_in_flight: config.max_in_flight,
            poll_interval: config.proxy_poll_interval,
            max_poll_attempts: config.proxy_poll_attempts,
        }
    }
}

#[derive(Debug, Default)]
struct IdentityState {
    in_use: bool,
    last_rate_limited_at: Option<Instant>,
}

impl IdentityState {
    fn is_available(&self, now: Instant, cooldown: Duration) -> bool {
        !self.in_use
            && self
                .last_rate_limited_at
                .map_or(true, |at| now.duration_since(at) > cooldown)
    }
}

pub struct ProxyPool {
    identities: Vec<ProxyIdentity>,
    states: Mutex<Vec<IdentityState>>,
    slots: Semaphore,
    settings: PoolSettings,
}

impl ProxyPool {
    pub fn new(identities: Vec<ProxyIdentity>, settings: PoolSettings) -> Result<Self, CrawlError> {
        if identities.is_empty() {
            return Err(CrawlError::Config("proxy pool needs at least one identity".into()));
        }
        if settings.max_in_flight == 0 {
            return Err(CrawlError::Config("proxy pool needs at least one slot".into()));
        }

        let states = identities.iter().map(|_| IdentityState::default()).collect();
        Ok(Self {
            identities,
            states: Mutex::new(states),
            slots: Semaphore::new(settings.max_in_flight),
            settings,
        })
    }

    /// One identity per configured proxy URL, or a single direct identity
    /// when no proxies are configured.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let identities = if config.proxies.is_empty() {
            vec![ProxyIdentity::new("direct", ExplorerClient::from_config(config, None)?)]
        } else {
            config
                .proxies
                .iter()
                .map(|url| {
                    ExplorerClient::from_config(config, Some(url))
                        .map(|client| ProxyIdentity::new(url.clone(), client))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        info!(
            identities = identities.len(),
            max_in_flight = config.max_in_flight,
            "Proxy pool ready"
        );
        Self::new(identities, PoolSettings::from_config(config))
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.settings.max_in_flight - self.slots.available_permits()
    }

    /// Wait for a free slot, then for an identity that is neither busy nor
    /// cooling down. Gives up with [`CrawlError::NoProxyAvailable`] after the
    /// configured number of polls.
    pub async fn acquire(&self) -> Result<ProxyLease<'_>, CrawlError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| CrawlError::Config("proxy pool slots closed".into()))?;

        for attempt in 1..=self.settings.max_poll_attempts {
            if let Some(index) = self.claim() {
                debug!(proxy = %self.identities[index].name, attempt, "Proxy acquired");
                return Ok(ProxyLease {
                    pool: self,
                    index,
                    throttled: false,
                    _permit: permit,
                });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        warn!(
            attempts = self.settings.max_poll_attempts,
            "Every proxy is busy or cooling down"
        );
        Err(CrawlError::NoProxyAvailable {
            attempts: self.settings.max_poll_attempts,
        })
    }

    /// Send one query through an available identity. A throttled response
    /// puts that identity into cooldown.
    pub async fn submit(&self, query: &ExplorerQuery) -> Result<FetchOutcome, CrawlError> {
        let mut lease = self.acquire().await?;
        let result = lease.identity().client.send(query).await;

        if matches!(result, Ok(FetchOutcome::Throttled)) {
            warn!(proxy = %lease.identity().name, "Proxy rate limited, cooling down");
            lease.mark_throttled();
        }

        result
    }

    /// Submit a flat batch with at most `max_in_flight` requests outstanding.
    /// Results come back in input order.
    pub async fn fetch_batch(
        &self,
        queries: &[ExplorerQuery],
    ) -> Vec<Result<FetchOutcome, CrawlError>> {
        stream::iter(queries)
            .map(|query| self.submit(query))
            .buffered(self.settings.max_in_flight)
            .collect()
            .await
    }

    fn claim(&self) -> Option<usize> {
        let now = Instant::now();
        let mut states = self.lock_states();
        let index = states
            .iter()
            .position(|s| s.is_available(now, self.settings.cooldown))?;
        states[index].in_use = true;
        Some(index)
    }

    fn release(&self, index: usize, throttled: bool) {
        let mut states = self.lock_states();
        let state = &mut states[index];
        state.in_use = false;
        if throttled {
            state.last_rate_limited_at = Some(Instant::now());
        }
    }

    fn lock_states(&self) -> MutexGuard<'_, Vec<IdentityState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StatsSource for ProxyPool {
    async fn request(&self, query: &ExplorerQuery) -> Result<FetchOutcome, CrawlError> {
        self.submit(query).await
    }
}

/// Exclusive use of one identity plus one in-flight slot. Both are given
/// back when the lease is dropped, whatever happened to the request.
pub struct ProxyLease<'a> {
    pool: &'a ProxyPool,
    index: usize,
    throttled: bool,
    _permit: SemaphorePermit<'a>,
}

impl ProxyLease<'_> {
    pub fn identity(&self) -> &ProxyIdentity {
        &self.pool.identities[self.index]
    }

    /// Start this identity's cooldown when the lease is released.
    pub fn mark_throttled(&mut self) {
        self.throttled = true;
    }
}

impl Drop for ProxyLease<'_> {
    fn drop(&mut self) {
        self.pool.release(self.index, self.throttled);
    }
}
