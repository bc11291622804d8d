//! Core data structures shared across the aggregation engine
//!
//! All record types are serde-serializable: cached values round-trip through
//! JSON, and the API layer (external to this crate) serializes these types
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single player record as returned by one source adapter
///
/// `uid` is assigned by the identity resolver during deduplication; adapters
/// may leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Cross-source identity key (filled in by `IdentityResolver`)
    #[serde(default)]
    pub uid: String,
    pub name: String,
    pub school: Option<String>,
    pub grad_year: Option<u16>,
    pub position: Option<String>,
    pub team: Option<String>,
    /// Id of the source this record came from
    pub source: String,
    /// Source-specific fields the core does not interpret
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Season stats for one player from one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsRecord {
    pub player_id: String,
    pub source: String,
    pub season: Option<String>,
    pub stats: serde_json::Value,
}

/// One row of a source leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub player: PlayerRecord,
    pub stat: String,
    pub value: f64,
}

/// Logical player search query, independent of any source's URL scheme
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub name: Option<String>,
    pub team: Option<String>,
    pub season: Option<String>,
}

impl SearchCriteria {
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Stable cache key fragment for this query
    ///
    /// Fields are joined in a fixed order so two equivalent criteria always
    /// produce the same key.
    pub fn cache_key(&self) -> String {
        format!(
            "name={}|team={}|season={}",
            self.name.as_deref().unwrap_or(""),
            self.team.as_deref().unwrap_or(""),
            self.season.as_deref().unwrap_or(""),
        )
    }
}

/// Per-source failure detail collected during a fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error_message: String,
}

/// Merged outcome of a player search fan-out
///
/// `partial` is true whenever at least one queried source failed. A result
/// with zero records and a full failure list is still a valid (non-error)
/// outcome; the caller decides whether that constitutes a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub records: Vec<PlayerRecord>,
    pub sources_queried: Vec<String>,
    pub sources_failed: Vec<SourceFailure>,
    pub partial: bool,
}

/// Merged outcome of a leaderboard fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResult {
    pub entries: Vec<LeaderboardEntry>,
    pub sources_queried: Vec<String>,
    pub sources_failed: Vec<SourceFailure>,
    pub partial: bool,
}

/// Read-only rate limiter snapshot for one source, for observability tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub source: String,
    /// Requests granted since the bucket was configured or reset
    pub requests_made: u64,
    /// Burst capacity (the per-minute limit)
    pub requests_allowed: u64,
    /// Whole tokens currently available
    pub requests_remaining: u64,
    /// When the bucket will be back at full capacity
    pub window_reset_at: DateTime<Utc>,
    pub is_limited: bool,
}
