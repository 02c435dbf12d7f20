//! Runs one frontier crawl per bucket, in order, persisting each result set.

use chess_core::Line;
use tracing::{error, info, warn};

use crate::artifact::ArtifactStore;
use crate::bucket::TraversalBucket;
use crate::crawler::FrontierCrawler;
use crate::error::CrawlError;
use crate::fetcher::Fetcher;

/// What happened to each bucket of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    /// Buckets that crawled fine but whose artifact could not be written
    pub failed_writes: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_writes.is_empty()
    }
}

pub struct BucketOrchestrator<F> {
    crawler: FrontierCrawler<F>,
    store: ArtifactStore,
    start_index: usize,
    skip_existing: bool,
}

impl<F: Fetcher> BucketOrchestrator<F> {
    pub fn new(crawler: FrontierCrawler<F>, store: ArtifactStore) -> Self {
        Self {
            crawler,
            store,
            start_index: 0,
            skip_existing: false,
        }
    }

    /// Skip every bucket before `index`.
    pub fn with_start_index(mut self, index: usize) -> Self {
        self.start_index = index;
        self
    }

    /// Skip buckets whose artifact is already on disk.
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn crawler(&self) -> &FrontierCrawler<F> {
        &self.crawler
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Crawl and persist `buckets[start_index..]` one after another.
    ///
    /// A failed crawl stops the run (the bucket has to be redone from
    /// scratch). A failed write is recorded in the summary and the run
    /// moves on to the next bucket.
    pub async fn run_all(&self, buckets: &[TraversalBucket]) -> Result<RunSummary, CrawlError> {
        let total = buckets.len();
        let mut summary = RunSummary::default();

        if self.start_index >= total {
            warn!(start_index = self.start_index, total, "Start index is past the last bucket");
        }

        for (index, bucket) in buckets.iter().enumerate().skip(self.start_index) {
            let id = bucket.id();
            let prefix = format!("P {index} of {total} | ");

            if self.skip_existing && self.store.exists(bucket) {
                info!(bucket = %id, "{prefix}Artifact exists, skipping");
                summary.skipped.push(id);
                continue;
            }

            let results = match self.crawler.crawl(Line::start(), bucket, &prefix).await {
                Ok(results) => results,
                Err(e) => {
                    error!(
                        bucket = %id,
                        index,
                        error = %e,
                        "{prefix}Bucket failed; restart from this index"
                    );
                    return Err(e);
                }
            };

            match self.store.write(bucket, &results) {
                Ok(_) => summary.completed.push(id),
                Err(e) => {
                    error!(bucket = %id, error = %e, "{prefix}Failed to persist bucket");
                    summary.failed_writes.push((id, e.to_string()));
                }
            }
        }

        info!(
            completed = summary.completed.len(),
            skipped = summary.skipped.len(),
            failed_writes = summary.failed_writes.len(),
            "Run finished"
        );
        Ok(summary)
    }
}
