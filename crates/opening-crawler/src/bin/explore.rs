//! One-shot explorer queries.
//!
//! Prints the explorer statistics for one or more positions as JSON. With
//! several positions and `EXPLORER_PROXIES` set, the queries go out as one
//! batch through the proxy pool.
//!
//! Usage: cargo run --bin explore -- [--speeds blitz,rapid] [--ratings 2000,2200] [--play e4,e5] [FEN...]
//!
//! Example:
//!   cargo run --bin explore -- --speeds blitz --ratings 2500 --play d4,d5,c4

use anyhow::{bail, Context};
use serde_json::json;
use tracing::info;

use opening_crawler::bucket::{Speed, TraversalBucket};
use opening_crawler::chess_core::Line;
use opening_crawler::config::CrawlConfig;
use opening_crawler::explorer::{ExplorerClient, ExplorerQuery, FetchOutcome};
use opening_crawler::fetcher::{RateLimitedFetcher, RetryPolicy};
use opening_crawler::proxy_pool::ProxyPool;

struct CliArgs {
    speeds: Vec<Speed>,
    ratings: Vec<u16>,
    play: Vec<String>,
    fens: Vec<String>,
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        speeds: vec![Speed::Blitz],
        ratings: vec![2000],
        play: Vec::new(),
        fens: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--speeds" => {
                let raw = args.get(i + 1).context("--speeds needs a value")?;
                cli.speeds = split_list(raw).map(str::parse).collect::<Result<_, _>>()?;
                i += 2;
            }
            "--ratings" => {
                let raw = args.get(i + 1).context("--ratings needs a value")?;
                cli.ratings = split_list(raw)
                    .map(|r| r.parse().with_context(|| format!("bad rating '{r}'")))
                    .collect::<Result<_, _>>()?;
                i += 2;
            }
            "--play" => {
                let raw = args.get(i + 1).context("--play needs a value")?;
                cli.play = split_list(raw).map(String::from).collect();
                i += 2;
            }
            flag if flag.starts_with("--") => bail!("Unknown argument: {flag}"),
            fen => {
                cli.fens.push(fen.to_string());
                i += 1;
            }
        }
    }

    if cli.speeds.is_empty() || cli.ratings.is_empty() {
        bail!("--speeds and --ratings must not be empty");
    }
    Ok(cli)
}

fn build_lines(cli: &CliArgs) -> anyhow::Result<Vec<Line>> {
    let roots = if cli.fens.is_empty() {
        vec![Line::start()]
    } else {
        cli.fens
            .iter()
            .map(|fen| Line::from_fen(fen))
            .collect::<Result<Vec<_>, _>>()?
    };

    roots
        .into_iter()
        .map(|root| {
            cli.play
                .iter()
                .try_fold(root, |line, san| line.play_san(san))
                .map_err(anyhow::Error::from)
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    opening_crawler::init_tracing();

    let cli = parse_args()?;
    let config = CrawlConfig::from_env()?;
    let settings = config.query_settings();

    // The bucket only seeds the query; speeds and ratings are then widened to
    // whatever was asked for on the command line.
    let seed = TraversalBucket::new(cli.speeds[0], cli.ratings[0]);
    let queries: Vec<ExplorerQuery> = build_lines(&cli)?
        .iter()
        .map(|line| ExplorerQuery {
            speeds: cli.speeds.clone(),
            ratings: cli.ratings.clone(),
            ..settings.query(line, &seed)
        })
        .collect();

    if queries.len() > 1 && !config.proxies.is_empty() {
        let pool = ProxyPool::from_config(&config)?;
        info!(queries = queries.len(), proxies = config.proxies.len(), "Submitting batch");

        for (query, result) in queries.iter().zip(pool.fetch_batch(&queries).await) {
            let entry = match result {
                Ok(FetchOutcome::Success(response)) => json!({ "fen": query.fen, "response": response }),
                Ok(FetchOutcome::Throttled) => json!({ "fen": query.fen, "throttled": true }),
                Ok(FetchOutcome::Error { status, body }) => {
                    json!({ "fen": query.fen, "status": status, "error": body })
                }
                Err(e) => json!({ "fen": query.fen, "error": e.to_string() }),
            };
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        return Ok(());
    }

    let fetcher = RateLimitedFetcher::new(
        ExplorerClient::from_config(&config, None)?,
        settings,
        RetryPolicy::sequential(&config),
    );
    for query in &queries {
        let response = fetcher.fetch_query(query).await?;
        let entry = json!({ "fen": query.fen, "response": response });
        println!("{}", serde_json::to_string_pretty(&entry)?);
    }

    Ok(())
}
