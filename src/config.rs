//! Aggregator configuration from environment variables

use crate::cache::{CacheBackendError, CacheNamespace, ResponseCache, SqliteCacheBackend};
use std::env;
use std::time::Duration;

/// Which cache backend to construct at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Disabled,
    Sqlite(String),
}

/// Configuration for the aggregation engine
///
/// Loaded from environment variables with sensible defaults; absent or
/// malformed values fall back to defaults, never panic.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Per-minute limit for sources without an explicit rate limit
    pub default_limit_per_minute: u32,

    /// Maximum records requested from any single source per fan-out
    pub per_source_cap: usize,

    /// How long a fan-out task waits on the rate limiter before giving up
    pub acquire_timeout: Duration,

    /// TTL for cached player search responses
    pub player_ttl: Duration,

    /// TTL for cached season stats
    pub stats_ttl: Duration,

    /// TTL for cached leaderboards
    pub leaderboard_ttl: Duration,

    /// TTL for cached raw pages (adapters may store fetched HTML here)
    pub raw_page_ttl: Duration,

    /// Enable fuzzy identity matching during deduplication
    pub fuzzy_dedup: bool,

    /// Cache backend selection
    pub cache_backend: CacheBackendKind,
}

impl AggregatorConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `STATFLOW_DEFAULT_RATE_LIMIT` (default: 60)
    /// - `STATFLOW_PER_SOURCE_CAP` (default: 50)
    /// - `STATFLOW_ACQUIRE_TIMEOUT_MS` (default: 10000)
    /// - `STATFLOW_PLAYER_TTL_SECS` (default: 900)
    /// - `STATFLOW_STATS_TTL_SECS` (default: 3600)
    /// - `STATFLOW_LEADERBOARD_TTL_SECS` (default: 600)
    /// - `STATFLOW_RAW_PAGE_TTL_SECS` (default: 300)
    /// - `STATFLOW_FUZZY_DEDUP` (default: false)
    /// - `STATFLOW_CACHE` (default: memory; also `disabled` or `sqlite:<path>`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_limit_per_minute: env_parse("STATFLOW_DEFAULT_RATE_LIMIT")
                .unwrap_or(defaults.default_limit_per_minute),

            per_source_cap: env_parse("STATFLOW_PER_SOURCE_CAP").unwrap_or(defaults.per_source_cap),

            acquire_timeout: env_parse("STATFLOW_ACQUIRE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),

            player_ttl: env_parse("STATFLOW_PLAYER_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.player_ttl),

            stats_ttl: env_parse("STATFLOW_STATS_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stats_ttl),

            leaderboard_ttl: env_parse("STATFLOW_LEADERBOARD_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.leaderboard_ttl),

            raw_page_ttl: env_parse("STATFLOW_RAW_PAGE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.raw_page_ttl),

            fuzzy_dedup: env_parse("STATFLOW_FUZZY_DEDUP").unwrap_or(defaults.fuzzy_dedup),

            cache_backend: env::var("STATFLOW_CACHE")
                .ok()
                .map(|raw| parse_cache_backend(&raw))
                .unwrap_or(defaults.cache_backend),
        }
    }

    /// Construct the response cache this configuration selects
    ///
    /// Only the SQLite backend can fail (disk/open errors); callers that
    /// treat the cache as optional may fall back to `ResponseCache::disabled()`.
    pub fn build_cache(&self) -> Result<ResponseCache, CacheBackendError> {
        match &self.cache_backend {
            CacheBackendKind::Memory => Ok(ResponseCache::in_memory()),
            CacheBackendKind::Disabled => Ok(ResponseCache::disabled()),
            CacheBackendKind::Sqlite(path) => {
                let backend = SqliteCacheBackend::new(path)?;
                Ok(ResponseCache::new(Box::new(backend)))
            }
        }
    }

    /// TTL to apply when filling the given namespace
    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        match namespace {
            CacheNamespace::Player => self.player_ttl,
            CacheNamespace::Stats => self.stats_ttl,
            CacheNamespace::Leaderboard => self.leaderboard_ttl,
            CacheNamespace::RawPage => self.raw_page_ttl,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_limit_per_minute: 60,
            per_source_cap: 50,
            acquire_timeout: Duration::from_millis(10_000),
            player_ttl: Duration::from_secs(900),
            stats_ttl: Duration::from_secs(3600),
            leaderboard_ttl: Duration::from_secs(600),
            raw_page_ttl: Duration::from_secs(300),
            fuzzy_dedup: false,
            cache_backend: CacheBackendKind::Memory,
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|s| s.parse().ok())
}

fn parse_cache_backend(raw: &str) -> CacheBackendKind {
    match raw.trim() {
        "disabled" => CacheBackendKind::Disabled,
        raw if raw.starts_with("sqlite:") => {
            CacheBackendKind::Sqlite(raw.trim_start_matches("sqlite:").to_string())
        }
        "memory" => CacheBackendKind::Memory,
        other => {
            log::warn!("⚠️  Unknown STATFLOW_CACHE value '{}', using memory", other);
            CacheBackendKind::Memory
        }
    }
}
