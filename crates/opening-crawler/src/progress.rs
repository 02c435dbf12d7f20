//! Crawl progress: counters owned by the crawl loop, reported separately.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CrawlProgress {
    started: Instant,
    processed: u64,
    queued: usize,
    throttled: u64,
}

impl CrawlProgress {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            processed: 0,
            queued: 0,
            throttled: 0,
        }
    }

    /// Called once per processed position with the current queue length and
    /// the fetcher's running throttle count.
    pub fn record(&mut self, queued: usize, throttled: u64) {
        self.processed += 1;
        self.queued = queued;
        self.throttled = throttled;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn queued(&self) -> usize {
        self.queued
    }

    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn positions_per_hour(&self) -> f64 {
        let hours = self.elapsed().as_secs_f64() / 3600.0;
        if hours > 0.0 {
            self.processed as f64 / hours
        } else {
            0.0
        }
    }
}

/// Logs a progress line every `every` processed positions.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    prefix: String,
    every: u64,
}

impl ProgressReporter {
    pub fn new(prefix: impl Into<String>, every: u64) -> Self {
        Self {
            prefix: prefix.into(),
            every: every.max(1),
        }
    }

    pub fn is_due(&self, progress: &CrawlProgress) -> bool {
        progress.processed() % self.every == 0
    }

    /// Log the queue length for every position, plus the rate and
    /// counters when a report is due. Returns whether the full line was
    /// logged.
    pub fn report(&self, progress: &CrawlProgress) -> bool {
        debug!(
            processed = progress.processed(),
            "{}positions left in queue: {}",
            self.prefix,
            progress.queued()
        );
        if !self.is_due(progress) {
            return false;
        }
        info!(
            processed = progress.processed(),
            queued = progress.queued(),
            throttled = progress.throttled(),
            per_hour = progress.positions_per_hour().round() as u64,
            "{}progress",
            self.prefix
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_positions_per_hour() {
        let mut progress = CrawlProgress::start();
        assert_eq!(progress.positions_per_hour(), 0.0);

        for _ in 0..50 {
            progress.record(7, 1);
        }
        tokio::time::advance(Duration::from_secs(1800)).await;

        assert_eq!(progress.processed(), 50);
        assert_eq!(progress.queued(), 7);
        assert_eq!(progress.throttled(), 1);
        assert!((progress.positions_per_hour() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_reporter_cadence() {
        let reporter = ProgressReporter::new("", 25);
        let mut progress = CrawlProgress::start();
        let mut due = 0;
        for _ in 0..100 {
            progress.record(0, 0);
            if reporter.is_due(&progress) {
                due += 1;
            }
        }
        assert_eq!(due, 4);
    }

    #[test]
    fn test_full_report_only_when_due() {
        let reporter = ProgressReporter::new("P 0 of 30 | ", 3);
        let mut progress = CrawlProgress::start();
        let logged: Vec<bool> = (0..7)
            .map(|_| {
                progress.record(1, 0);
                reporter.report(&progress)
            })
            .collect();
        assert_eq!(logged, vec![false, false, true, false, false, true, false]);
    }
}
