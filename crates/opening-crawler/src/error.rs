//! Crawler error types

use thiserror::Error;

/// Everything that can stop a fetch, a bucket crawl or a run.
///
/// Throttling is deliberately absent: a 429 is a
/// [`FetchOutcome::Throttled`](crate::explorer::FetchOutcome) that the
/// fetch layer waits out, never an error.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Explorer returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("No proxy available after {attempts} polling attempts")]
    NoProxyAvailable { attempts: u32 },

    #[error("Cannot apply move '{san}' in {fen}: {reason}")]
    MoveApplication {
        fen: String,
        san: String,
        reason: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chess error: {0}")]
    Chess(#[from] chess_core::ChessError),
}
