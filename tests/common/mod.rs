#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use opening_crawler::bucket::TraversalBucket;
use opening_crawler::chess_core::Line;
use opening_crawler::explorer::{ExplorerResponse, MoveStat};
use opening_crawler::fetcher::Fetcher;
use opening_crawler::CrawlError;

/// Generate a unique suffix based on timestamp to avoid collisions.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

/// Fresh, not yet created directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("opening-crawl-{name}-{}", unique_suffix()))
}

/// Play a sequence of SAN moves from the initial position.
pub fn line(moves: &[&str]) -> Line {
    moves
        .iter()
        .fold(Line::start(), |line, san| line.play_san(san).unwrap())
}

pub fn stat(san: &str, white: u64, draws: u64, black: u64) -> MoveStat {
    MoveStat {
        san: san.to_string(),
        uci: None,
        white,
        draws,
        black,
    }
}

pub fn response(white: u64, draws: u64, black: u64, moves: Vec<MoveStat>) -> ExplorerResponse {
    ExplorerResponse {
        white,
        draws,
        black,
        moves,
    }
}

// ---------------------------------------------------------------------------
// In-memory fetcher
// ---------------------------------------------------------------------------

/// Serves canned explorer data keyed by FEN. Positions without data answer
/// with a leaf (some games, no moves).
#[derive(Default)]
pub struct TreeFetcher {
    tree: HashMap<String, ExplorerResponse>,
    /// Per-position artificial latency, to scramble completion order
    delays: HashMap<String, Duration>,
    /// Bucket on which every fetch fails with a remote error
    fail_on: Option<TraversalBucket>,
    pub calls: Mutex<Vec<(TraversalBucket, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl TreeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, line: &Line, response: ExplorerResponse) -> Self {
        self.tree.insert(line.fen().to_string(), response);
        self
    }

    pub fn with_delay(mut self, line: &Line, delay: Duration) -> Self {
        self.delays.insert(line.fen().to_string(), delay);
        self
    }

    pub fn failing_on(mut self, bucket: TraversalBucket) -> Self {
        self.fail_on = Some(bucket);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn buckets_seen(&self) -> Vec<TraversalBucket> {
        let mut seen: Vec<TraversalBucket> = Vec::new();
        for (bucket, _) in self.calls.lock().unwrap().iter() {
            if !seen.contains(bucket) {
                seen.push(*bucket);
            }
        }
        seen
    }
}

#[async_trait]
impl Fetcher for TreeFetcher {
    async fn fetch_stats(
        &self,
        line: &Line,
        bucket: &TraversalBucket,
    ) -> Result<ExplorerResponse, CrawlError> {
        self.calls
            .lock()
            .unwrap()
            .push((*bucket, line.fen().to_string()));

        if self.fail_on == Some(*bucket) {
            return Err(CrawlError::Remote {
                status: 400,
                body: "Invalid fen".to_string(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(line.fen()) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self
            .tree
            .get(line.fen())
            .cloned()
            .unwrap_or_else(|| response(1, 1, 1, Vec::new())))
    }
}

// ---------------------------------------------------------------------------
// Mock explorer HTTP server
// ---------------------------------------------------------------------------

/// Behaviour of the mock explorer endpoint.
#[derive(Default)]
pub struct MockExplorer {
    /// Answer 429 to this many requests before serving anything
    pub throttle_first: AtomicUsize,
    /// Status to answer with instead of data (e.g. 500)
    pub fail_with: Option<u16>,
    /// JSON bodies keyed by the `fen` parameter
    pub responses: HashMap<String, Value>,
    /// Latency added to every request
    pub delay: Duration,
    pub hits: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub seen: Mutex<Vec<HashMap<String, String>>>,
}

impl MockExplorer {
    pub fn throttling(n: usize) -> Self {
        Self {
            throttle_first: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn with(mut self, line: &Line, body: Value) -> Self {
        self.responses.insert(line.fen().to_string(), body);
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn explorer(
    State(mock): State<Arc<MockExplorer>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    mock.seen.lock().unwrap().push(params.clone());

    let now = mock.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    mock.max_in_flight.fetch_max(now, Ordering::SeqCst);
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }
    mock.in_flight.fetch_sub(1, Ordering::SeqCst);

    let throttled = mock
        .throttle_first
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if throttled {
        return (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
    }

    if let Some(status) = mock.fail_with {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "Invalid fen").into_response();
    }

    let fen = params.get("fen").cloned().unwrap_or_default();
    let body = mock
        .responses
        .get(&fen)
        .cloned()
        .unwrap_or_else(|| serde_json::json!({ "white": 1, "draws": 1, "black": 1, "moves": [] }));
    (StatusCode::OK, Json(body)).into_response()
}

/// Serve `mock` on an ephemeral local port. Returns the explorer URL.
pub async fn spawn_explorer(mock: Arc<MockExplorer>) -> String {
    let app = Router::new()
        .route("/lichess", get(explorer))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/lichess")
}

/// URL on a local port nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/lichess")
}
