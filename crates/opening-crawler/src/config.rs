//! Crawler configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CrawlError;
use crate::explorer::{QueryForm, QuerySettings};

pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.lichess.ovh/lichess";

#[derive(Clone, Debug)]
pub struct CrawlConfig {
    /// Explorer endpoint queried for every position
    pub explorer_url: String,

    /// Variant parameter sent with each query
    pub variant: String,

    /// Minimum games (white + draws + black) for a move to be followed
    pub min_games: u64,

    /// Number of candidate moves requested per position (None omits the parameter)
    pub moves: Option<u32>,

    /// Whether positions are addressed by FEN or by move list from the start
    pub query_form: QueryForm,

    /// Wait after a 429 before retrying on the same egress
    pub rate_limit_cooldown: Duration,

    /// Wait between attempts after a transport failure
    pub transport_retry_delay: Duration,

    /// Consecutive transport failures tolerated before giving up
    pub max_transport_retries: u32,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    pub user_agent: String,

    /// Proxy URLs for pooled mode, one egress identity each
    pub proxies: Vec<String>,

    /// Ceiling on concurrent requests in pooled mode
    pub max_in_flight: usize,

    /// Wait between polls when every proxy is busy or cooling down
    pub proxy_poll_interval: Duration,

    /// Polls before giving up on finding a proxy
    pub proxy_poll_attempts: u32,

    /// Root directory for bucket artifacts
    pub output_dir: PathBuf,

    /// First bucket index to crawl
    pub start_index: usize,

    /// Successors deeper than this ply are not enqueued
    pub max_ply: Option<usize>,

    /// Log progress every N processed positions
    pub progress_every: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            variant: "standard".to_string(),
            min_games: 1000,
            moves: Some(50),
            query_form: QueryForm::Fen,
            rate_limit_cooldown: Duration::from_secs(62),
            transport_retry_delay: Duration::from_secs(5),
            max_transport_retries: 5,
            http_timeout: Duration::from_secs(120),
            user_agent: "OpeningCrawl/1.0".to_string(),
            proxies: Vec::new(),
            max_in_flight: 10,
            proxy_poll_interval: Duration::from_secs(3),
            proxy_poll_attempts: 100,
            output_dir: PathBuf::from("data"),
            start_index: 0,
            max_ply: None,
            progress_every: 25,
        }
    }
}

impl CrawlConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, CrawlError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from `lookup`, which maps a variable name to
    /// its raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CrawlError> {
        let defaults = Self::default();
        let var = &lookup;
        let secs = |name: &str| parse_secs(name, var(name));

        let moves = match parse_var::<u32>("EXPLORER_MOVES", var("EXPLORER_MOVES"))? {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.moves,
        };

        let proxies = var("EXPLORER_PROXIES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            explorer_url: var("EXPLORER_URL").unwrap_or(defaults.explorer_url),
            variant: var("EXPLORER_VARIANT").unwrap_or(defaults.variant),
            min_games: parse_var("MIN_GAMES", var("MIN_GAMES"))?.unwrap_or(defaults.min_games),
            moves,
            query_form: parse_var("QUERY_FORM", var("QUERY_FORM"))?
                .unwrap_or(defaults.query_form),
            rate_limit_cooldown: secs("RATE_LIMIT_COOLDOWN_SECS")?
                .unwrap_or(defaults.rate_limit_cooldown),
            transport_retry_delay: secs("TRANSPORT_RETRY_SECS")?
                .unwrap_or(defaults.transport_retry_delay),
            max_transport_retries: parse_var("MAX_TRANSPORT_RETRIES", var("MAX_TRANSPORT_RETRIES"))?
                .unwrap_or(defaults.max_transport_retries),
            http_timeout: secs("HTTP_TIMEOUT_SECS")?.unwrap_or(defaults.http_timeout),
            user_agent: var("USER_AGENT").unwrap_or(defaults.user_agent),
            proxies,
            max_in_flight: parse_var("MAX_IN_FLIGHT", var("MAX_IN_FLIGHT"))?
                .unwrap_or(defaults.max_in_flight),
            proxy_poll_interval: secs("PROXY_POLL_SECS")?.unwrap_or(defaults.proxy_poll_interval),
            proxy_poll_attempts: parse_var("PROXY_POLL_ATTEMPTS", var("PROXY_POLL_ATTEMPTS"))?
                .unwrap_or(defaults.proxy_poll_attempts),
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            start_index: parse_var("START_INDEX", var("START_INDEX"))?
                .unwrap_or(defaults.start_index),
            max_ply: parse_var("MAX_PLY", var("MAX_PLY"))?,
            progress_every: parse_var("PROGRESS_EVERY", var("PROGRESS_EVERY"))?
                .unwrap_or(defaults.progress_every),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.min_games == 0 {
            // Without a popularity floor the crawl never runs dry.
            return Err(CrawlError::Config("MIN_GAMES must be at least 1".into()));
        }
        if self.max_in_flight == 0 {
            return Err(CrawlError::Config("MAX_IN_FLIGHT must be at least 1".into()));
        }
        if self.proxy_poll_attempts == 0 {
            return Err(CrawlError::Config(
                "PROXY_POLL_ATTEMPTS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            variant: self.variant.clone(),
            form: self.query_form,
            moves: self.moves,
        }
    }

    /// Directory holding the artifacts of one threshold, e.g. `data/1000`.
    pub fn dataset_dir(&self) -> PathBuf {
        self.output_dir.join(self.min_games.to_string())
    }
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, CrawlError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CrawlError::Config(format!("{name} has an invalid value: '{raw}'"))),
        None => Ok(None),
    }
}

fn parse_secs(name: &str, raw: Option<String>) -> Result<Option<Duration>, CrawlError> {
    Ok(parse_var::<u64>(name, raw)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(62));
        assert_eq!(config.dataset_dir(), PathBuf::from("data/1000"));
    }

    fn from_vars(vars: &[(&str, &str)]) -> Result<CrawlConfig, CrawlError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CrawlConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.min_games, 1000);
        assert_eq!(config.moves, Some(50));
        assert!(config.proxies.is_empty());
        assert_eq!(config.max_ply, None);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = from_vars(&[
            ("MIN_GAMES", " 250 "),
            ("QUERY_FORM", "play"),
            ("RATE_LIMIT_COOLDOWN_SECS", "30"),
            ("MAX_PLY", "12"),
            ("OUTPUT_DIR", "/tmp/crawl"),
        ])
        .unwrap();

        assert_eq!(config.min_games, 250);
        assert_eq!(config.query_form, QueryForm::Play);
        assert_eq!(config.rate_limit_cooldown, Duration::from_secs(30));
        assert_eq!(config.max_ply, Some(12));
        assert_eq!(config.dataset_dir(), PathBuf::from("/tmp/crawl/250"));
    }

    #[test]
    fn test_invalid_number_is_a_config_error() {
        let err = from_vars(&[("MIN_GAMES", "lots")]).unwrap_err();
        assert!(
            matches!(err, CrawlError::Config(ref msg) if msg == "MIN_GAMES has an invalid value: 'lots'")
        );

        assert!(matches!(
            from_vars(&[("PROXY_POLL_SECS", "-3")]),
            Err(CrawlError::Config(_))
        ));
        assert!(matches!(
            from_vars(&[("QUERY_FORM", "uci")]),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_zero_moves_omits_parameter() {
        let config = from_vars(&[("EXPLORER_MOVES", "0")]).unwrap();
        assert_eq!(config.moves, None);
        assert_eq!(config.query_settings().moves, None);

        let config = from_vars(&[("EXPLORER_MOVES", "12")]).unwrap();
        assert_eq!(config.moves, Some(12));
    }

    #[test]
    fn test_proxies_split_and_trimmed() {
        let config = from_vars(&[(
            "EXPLORER_PROXIES",
            " http://a:8080, ,socks5://b:1080 ,",
        )])
        .unwrap();
        assert_eq!(config.proxies, vec!["http://a:8080", "socks5://b:1080"]);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        assert!(matches!(
            from_vars(&[("MAX_IN_FLIGHT", "0")]),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let config = CrawlConfig {
            min_games: 0,
            ..CrawlConfig::default()
        };
        assert!(matches!(config.validate(), Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_query_settings_follow_config() {
        let config = CrawlConfig {
            moves: None,
            query_form: QueryForm::Play,
            ..CrawlConfig::default()
        };
        let settings = config.query_settings();
        assert_eq!(settings.moves, None);
        assert_eq!(settings.form, QueryForm::Play);
        assert_eq!(settings.variant, "standard");
    }
}
