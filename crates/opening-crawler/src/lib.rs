//! Opening explorer crawler.
//!
//! Walks the tree of popular positions from the initial position, one
//! (speed, rating) bucket at a time, querying the Lichess opening explorer
//! for each position and following every move played at least `min_games`
//! times.

pub use chess_core;

pub mod artifact;
pub mod bucket;
pub mod config;
pub mod crawler;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod frontier;
pub mod orchestrator;
pub mod progress;
pub mod proxy_pool;

pub use error::CrawlError;

/// Initialize tracing for the binaries: `RUST_LOG` when set, `info` otherwise.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
