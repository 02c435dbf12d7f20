//! Traversal buckets: one (time control, rating band) pair per crawl.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// Time-control classes understood by the explorer, in crawl order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Speed {
    UltraBullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

impl Speed {
    pub const ALL: [Speed; 6] = [
        Speed::UltraBullet,
        Speed::Bullet,
        Speed::Blitz,
        Speed::Rapid,
        Speed::Classical,
        Speed::Correspondence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Speed::UltraBullet => "ultraBullet",
            Speed::Bullet => "bullet",
            Speed::Blitz => "blitz",
            Speed::Rapid => "rapid",
            Speed::Classical => "classical",
            Speed::Correspondence => "correspondence",
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speed {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Speed::ALL
            .into_iter()
            .find(|speed| speed.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CrawlError::Config(format!("unknown speed '{s}'")))
    }
}

/// Rating bands (lower bound of each explorer rating group), in crawl order.
pub const RATING_BANDS: [u16; 5] = [1600, 1800, 2000, 2200, 2500];

/// One independent traversal and output dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraversalBucket {
    pub speed: Speed,
    pub rating: u16,
}

impl TraversalBucket {
    pub fn new(speed: Speed, rating: u16) -> Self {
        Self { speed, rating }
    }

    /// Identifier used for log lines and artifact names, e.g. `blitz-2000`.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TraversalBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.speed, self.rating)
    }
}

/// Speed-major cross product of every speed and rating band. A run resumed
/// at index `i` picks up exactly where a previous run stopped, so the order
/// must stay stable.
pub fn all_buckets() -> Vec<TraversalBucket> {
    Speed::ALL
        .iter()
        .flat_map(|&speed| {
            RATING_BANDS
                .iter()
                .map(move |&rating| TraversalBucket::new(speed, rating))
        })
        .collect()
}
