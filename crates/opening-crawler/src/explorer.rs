//! Opening explorer client: request building and response classification.

use std::str::FromStr;

use chess_core::Line;
use reqwest::{Client, Proxy, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bucket::{Speed, TraversalBucket};
use crate::config::CrawlConfig;
use crate::error::CrawlError;

/// Game outcome counts for a position or a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub white: u64,
    pub draws: u64,
    pub black: u64,
}

impl Outcome {
    pub fn total(&self) -> u64 {
        self.white + self.draws + self.black
    }
}

/// Statistics for one move played from a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStat {
    pub san: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,
    pub white: u64,
    pub draws: u64,
    pub black: u64,
}

impl MoveStat {
    pub fn outcome(&self) -> Outcome {
        Outcome {
            white: self.white,
            draws: self.draws,
            black: self.black,
        }
    }

    pub fn total(&self) -> u64 {
        self.outcome().total()
    }
}

/// Explorer payload: aggregate outcome of the position plus per-move stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerResponse {
    pub white: u64,
    pub draws: u64,
    pub black: u64,
    #[serde(default)]
    pub moves: Vec<MoveStat>,
}

impl ExplorerResponse {
    pub fn outcome(&self) -> Outcome {
        Outcome {
            white: self.white,
            draws: self.draws,
            black: self.black,
        }
    }
}

/// Classified result of a single explorer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(ExplorerResponse),
    /// HTTP 429: back off, then send the same request again.
    Throttled,
    /// Any other non-success status, with the body for diagnostics.
    Error { status: u16, body: String },
}

/// Map an HTTP status and body to a [`FetchOutcome`].
pub fn classify(status: StatusCode, body: &str) -> Result<FetchOutcome, CrawlError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Ok(FetchOutcome::Throttled);
    }

    if !status.is_success() {
        return Ok(FetchOutcome::Error {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    Ok(FetchOutcome::Success(serde_json::from_str(body)?))
}

/// How a position is identified in the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryForm {
    /// `fen` is the position itself.
    #[default]
    Fen,
    /// `fen` is the root of the line and `play` lists the moves from it.
    Play,
}

impl FromStr for QueryForm {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fen" => Ok(QueryForm::Fen),
            "play" => Ok(QueryForm::Play),
            other => Err(CrawlError::Config(format!("unknown query form '{other}'"))),
        }
    }
}

/// Per-run request parameters shared by every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    pub variant: String,
    pub form: QueryForm,
    pub moves: Option<u32>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            variant: "standard".to_string(),
            form: QueryForm::Fen,
            moves: Some(50),
        }
    }
}

impl QuerySettings {
    pub fn query(&self, line: &Line, bucket: &TraversalBucket) -> ExplorerQuery {
        let (fen, play) = match self.form {
            QueryForm::Fen => (line.fen().to_string(), Vec::new()),
            QueryForm::Play => (line.root().to_string(), line.history_uci()),
        };

        ExplorerQuery {
            variant: self.variant.clone(),
            fen,
            play,
            speeds: vec![bucket.speed],
            ratings: vec![bucket.rating],
            moves: self.moves,
        }
    }
}

/// One explorer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerQuery {
    pub variant: String,
    pub fen: String,
    pub play: Vec<String>,
    pub speeds: Vec<Speed>,
    pub ratings: Vec<u16>,
    pub moves: Option<u32>,
}

impl ExplorerQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("variant", self.variant.clone()),
            ("fen", self.fen.clone()),
        ];

        if !self.play.is_empty() {
            params.push(("play", self.play.join(",")));
        }

        params.push((
            "speeds",
            self.speeds
                .iter()
                .map(Speed::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ));
        params.push((
            "ratings",
            self.ratings
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ));

        if let Some(moves) = self.moves {
            params.push(("moves", moves.to_string()));
        }

        params
    }
}

/// HTTP client for the explorer endpoint, optionally bound to one proxy.
#[derive(Clone)]
pub struct ExplorerClient {
    client: Client,
    base_url: String,
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build a client from config, routing all traffic through `proxy_url`
    /// when given.
    pub fn from_config(config: &CrawlConfig, proxy_url: Option<&str>) -> Result<Self, CrawlError> {
        Url::parse(&config.explorer_url).map_err(|e| {
            CrawlError::Config(format!("EXPLORER_URL '{}' is invalid: {e}", config.explorer_url))
        })?;

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.http_timeout);

        if let Some(url) = proxy_url {
            builder = builder.proxy(Proxy::all(url)?);
        }

        Ok(Self::new(config.explorer_url.clone(), builder.build()?))
    }

    /// Send one request and classify the response. Transport failures are
    /// returned as [`CrawlError::Http`].
    pub async fn send(&self, query: &ExplorerQuery) -> Result<FetchOutcome, CrawlError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query.params())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!(status = status.as_u16(), fen = %query.fen, "Explorer response");

        classify(status, &body)
    }
}
