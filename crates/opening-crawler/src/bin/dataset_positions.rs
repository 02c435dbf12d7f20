//! Summarize a crawled dataset.
//!
//! Loads every bucket artifact in a dataset directory and prints the number
//! of positions per bucket and the number of distinct positions overall.
//!
//! Usage: cargo run --bin dataset-positions -- [DIR]
//! Defaults to `$OUTPUT_DIR/$MIN_GAMES`.

use std::path::PathBuf;

use opening_crawler::artifact::{distinct_positions, ArtifactStore};
use opening_crawler::config::CrawlConfig;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    opening_crawler::init_tracing();

    let dir = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => CrawlConfig::from_env()?.dataset_dir(),
    };

    let store = ArtifactStore::new(dir.clone());
    let artifacts = store.load_all()?;

    if artifacts.is_empty() {
        eprintln!("No artifacts found in {}", dir.display());
        std::process::exit(1);
    }

    println!("Dataset: {}", dir.display());
    for (bucket, records) in &artifacts {
        println!("  {:<22} {:>8} positions", bucket, records.len());
    }

    let total: usize = artifacts.iter().map(|(_, records)| records.len()).sum();
    let distinct = distinct_positions(artifacts.iter().map(|(_, records)| records));

    println!();
    println!("Buckets:            {}", artifacts.len());
    println!("Records:            {}", total);
    println!("Distinct positions: {}", distinct);

    Ok(())
}
