//! Breadth-first frontier crawl of one bucket.
//!
//! The loop owns the frontier, the visited set and the result set. Fetches
//! may run concurrently (`max_in_flight > 1` in pooled mode), but their
//! results are consumed strictly in dequeue order, so the records and the
//! frontier evolve exactly as in a sequential crawl.

use chess_core::{Line, PositionKey};
use futures::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bucket::TraversalBucket;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::explorer::{ExplorerResponse, MoveStat, Outcome};
use crate::fetcher::Fetcher;
use crate::frontier::Frontier;
use crate::progress::{CrawlProgress, ProgressReporter};

/// A position whose own statistics have been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub result: Outcome,
    pub fen: PositionKey,
}

/// Records of one bucket in breadth-first order.
pub type ResultSet = Vec<PositionRecord>;

/// Which moves are followed out of a fetched position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionPolicy {
    /// Minimum total games for a move to be followed (inclusive)
    pub min_games: u64,
    /// Deepest ply a successor may have, if limited
    pub max_ply: Option<usize>,
}

impl ExpansionPolicy {
    pub fn new(min_games: u64) -> Self {
        Self {
            min_games,
            max_ply: None,
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            min_games: config.min_games,
            max_ply: config.max_ply,
        }
    }

    pub fn follows(&self, stat: &MoveStat) -> bool {
        stat.total() >= self.min_games
    }

    pub fn admits_ply(&self, ply: usize) -> bool {
        self.max_ply.map_or(true, |max| ply <= max)
    }
}

pub struct FrontierCrawler<F> {
    fetcher: F,
    policy: ExpansionPolicy,
    max_in_flight: usize,
    progress_every: u64,
}

impl<F: Fetcher> FrontierCrawler<F> {
    pub fn new(fetcher: F, policy: ExpansionPolicy) -> Self {
        Self {
            fetcher,
            policy,
            max_in_flight: 1,
            progress_every: 25,
        }
    }

    /// Allow up to `n` fetches in flight. Only useful with a fetcher that
    /// can serve concurrent requests (the proxy pool).
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }

    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Crawl `bucket` from the standard initial position.
    pub async fn crawl_bucket(&self, bucket: &TraversalBucket) -> Result<ResultSet, CrawlError> {
        self.crawl(Line::start(), bucket, "").await
    }

    /// Crawl `bucket` from `root` until no fetched position yields a
    /// successor at or above the popularity threshold.
    pub async fn crawl(
        &self,
        root: Line,
        bucket: &TraversalBucket,
        log_prefix: &str,
    ) -> Result<ResultSet, CrawlError> {
        let reporter = ProgressReporter::new(log_prefix, self.progress_every);
        let mut progress = CrawlProgress::start();
        let mut frontier = Frontier::new(root);
        let mut results = ResultSet::new();
        let mut in_flight = FuturesOrdered::new();

        info!(bucket = %bucket, min_games = self.policy.min_games, "{log_prefix}Starting bucket");

        loop {
            while in_flight.len() < self.max_in_flight {
                let Some(line) = frontier.pop() else { break };
                let fetcher = &self.fetcher;
                in_flight.push_back(async move {
                    let response = fetcher.fetch_stats(&line, bucket).await;
                    (line, response)
                });
            }

            let Some((line, response)) = in_flight.next().await else {
                break;
            };
            let response = response?;

            results.push(PositionRecord {
                result: response.outcome(),
                fen: line.key().clone(),
            });
            let queued = self.expand(&mut frontier, &line, &response)?;
            debug!(fen = %line.key(), ply = line.ply(), queued, "Position recorded");

            progress.record(
                frontier.len() + in_flight.len(),
                self.fetcher.throttle_events(),
            );
            reporter.report(&progress);
        }

        info!(
            bucket = %bucket,
            positions = results.len(),
            elapsed_secs = progress.elapsed().as_secs(),
            per_hour = progress.positions_per_hour().round() as u64,
            "{log_prefix}Bucket complete"
        );
        Ok(results)
    }

    /// Offer every popular successor of `line` to the frontier. Returns how
    /// many were newly queued.
    fn expand(
        &self,
        frontier: &mut Frontier,
        line: &Line,
        response: &ExplorerResponse,
    ) -> Result<usize, CrawlError> {
        if !self.policy.admits_ply(line.ply() + 1) {
            return Ok(0);
        }

        let mut queued = 0;
        for stat in response.moves.iter().filter(|s| self.policy.follows(s)) {
            let next = line
                .play_san(&stat.san)
                .map_err(|e| CrawlError::MoveApplication {
                    fen: line.fen().to_string(),
                    san: stat.san.clone(),
                    reason: e.to_string(),
                })?;

            if frontier.offer(next) {
                queued += 1;
            }
        }
        Ok(queued)
    }
}
