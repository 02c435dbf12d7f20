//! Opening explorer crawl
//!
//! Crawls every (speed, rating) bucket from the initial position and writes
//! one JSON dataset per bucket under `$OUTPUT_DIR/$MIN_GAMES/`.
//!
//! Usage: cargo run --release --bin crawl -- [--start-index N] [--pooled] [--skip-existing]

use anyhow::{bail, Context};
use tracing::info;

use opening_crawler::artifact::ArtifactStore;
use opening_crawler::bucket::{all_buckets, TraversalBucket};
use opening_crawler::config::CrawlConfig;
use opening_crawler::crawler::{ExpansionPolicy, FrontierCrawler};
use opening_crawler::explorer::ExplorerClient;
use opening_crawler::fetcher::{Fetcher, RateLimitedFetcher, RetryPolicy};
use opening_crawler::orchestrator::{BucketOrchestrator, RunSummary};
use opening_crawler::proxy_pool::ProxyPool;
use opening_crawler::CrawlError;

#[derive(Debug, Default)]
struct CliArgs {
    start_index: Option<usize>,
    pooled: bool,
    skip_existing: bool,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--start-index" => {
                let raw = args.get(i + 1).context("--start-index needs a value")?;
                cli.start_index = Some(raw.parse().context("--start-index must be a number")?);
                i += 2;
            }
            "--pooled" => {
                cli.pooled = true;
                i += 1;
            }
            "--skip-existing" => {
                cli.skip_existing = true;
                i += 1;
            }
            other => bail!("Unknown argument: {other}"),
        }
    }

    Ok(cli)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();
    opening_crawler::init_tracing();

    let cli = parse_args()?;
    let mut config = CrawlConfig::from_env()?;
    if let Some(index) = cli.start_index {
        config.start_index = index;
    }

    let buckets = all_buckets();
    info!(
        explorer = %config.explorer_url,
        min_games = config.min_games,
        moves = ?config.moves,
        start_index = config.start_index,
        buckets = buckets.len(),
        pooled = cli.pooled,
        output = %config.dataset_dir().display(),
        "Crawl config loaded"
    );

    let store = ArtifactStore::from_config(&config);

    let summary = if cli.pooled {
        let pool = ProxyPool::from_config(&config)?;
        let fetcher =
            RateLimitedFetcher::new(pool, config.query_settings(), RetryPolicy::pooled(&config));
        run(fetcher, &config, config.max_in_flight, store, cli.skip_existing, &buckets).await?
    } else {
        let client = ExplorerClient::from_config(&config, None)?;
        let fetcher = RateLimitedFetcher::new(
            client,
            config.query_settings(),
            RetryPolicy::sequential(&config),
        );
        run(fetcher, &config, 1, store, cli.skip_existing, &buckets).await?
    };

    if !summary.is_clean() {
        for (bucket, error) in &summary.failed_writes {
            eprintln!("  {bucket}: {error}");
        }
        bail!("{} bucket(s) could not be persisted", summary.failed_writes.len());
    }

    Ok(())
}

async fn run<F: Fetcher>(
    fetcher: F,
    config: &CrawlConfig,
    max_in_flight: usize,
    store: ArtifactStore,
    skip_existing: bool,
    buckets: &[TraversalBucket],
) -> Result<RunSummary, CrawlError> {
    let crawler = FrontierCrawler::new(fetcher, ExpansionPolicy::from_config(config))
        .with_max_in_flight(max_in_flight)
        .with_progress_every(config.progress_every);

    BucketOrchestrator::new(crawler, store)
        .with_start_index(config.start_index)
        .with_skip_existing(skip_existing)
        .run_all(buckets)
        .await
}
