//! Fan-out aggregation across all registered sources
//!
//! Single entry point for callers: a logical query fans out to every
//! enabled, capability-matching source adapter in parallel, each call gated
//! by the rate limiter and fronted by the response cache. Individual source
//! failures are isolated: captured as values and reported, never allowed
//! to abort sibling tasks or fail the overall call.
//!
//! ## Flow
//!
//! ```text
//! search(criteria)
//!     ↓
//! resolve targets (explicit ∩ enabled ∩ capability)
//!     ↓
//! spawn one task per source:
//!     rate_limiter.acquire → cache.get → adapter call → cache.set
//!     ↓
//! join all (structured: the call returns only after every task settles)
//!     ↓
//! concatenate → deduplicate → truncate → AggregationResult
//! ```
//!
//! No retries at this layer: adapter-level retry policy is the adapter's
//! own concern. The contract here is best-effort, mark-and-continue.

use crate::cache::{CacheNamespace, ResponseCache};
use crate::config::AggregatorConfig;
use crate::error::AggregateError;
use crate::identity::IdentityResolver;
use crate::rate_limit::RateLimiter;
use crate::records::{
    AggregationResult, LeaderboardEntry, LeaderboardResult, PlayerRecord, SearchCriteria,
    SourceFailure, StatsRecord,
};
use crate::source::{Capability, SourceAdapter, SourceRegistry};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Failure message recorded when the rate limiter times out for a source
const RATE_LIMIT_TIMEOUT_MSG: &str = "rate limit timeout";

/// Orchestrates parallel calls across all registered source adapters
///
/// All collaborators are injected at construction and shared via `Arc`;
/// the aggregator itself is cheap to clone behind an `Arc` and safe to use
/// from many tasks at once.
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    resolver: Arc<IdentityResolver>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        resolver: Arc<IdentityResolver>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            cache,
            resolver,
            config,
        }
    }

    /// Search players across sources, returning a deduplicated, bounded result
    ///
    /// `sources` restricts the fan-out to the named ids (intersected with
    /// enabled, capable sources); `None` targets every capable source. An
    /// empty resolved target set is a caller/configuration error and fails
    /// fast; everything downstream degrades to a partial result instead.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        sources: Option<&[String]>,
        limit: usize,
    ) -> Result<AggregationResult, AggregateError> {
        let targets = self.resolve_targets(sources, Capability::PlayerSearch)?;
        let sources_queried: Vec<String> = targets.iter().map(|(d, _)| d.id.clone()).collect();

        log::info!(
            "🔍 Fanning out search to {} source(s): {:?}",
            targets.len(),
            sources_queried
        );

        let mut handles: Vec<(String, JoinHandle<Result<Vec<PlayerRecord>, SourceFailure>>)> =
            Vec::with_capacity(targets.len());

        for (descriptor, adapter) in targets {
            let source_id = descriptor.id.clone();
            let rate_limiter = Arc::clone(&self.rate_limiter);
            let cache = Arc::clone(&self.cache);
            let criteria = criteria.clone();
            let per_source_cap = self.config.per_source_cap;
            let acquire_timeout = self.config.acquire_timeout;
            let ttl = self.config.ttl_for(CacheNamespace::Player);

            let task_source = source_id.clone();
            let handle = tokio::spawn(async move {
                fetch_players(
                    task_source,
                    adapter,
                    rate_limiter,
                    cache,
                    criteria,
                    per_source_cap,
                    acquire_timeout,
                    ttl,
                )
                .await
            });
            handles.push((source_id, handle));
        }

        let mut records: Vec<PlayerRecord> = Vec::new();
        let mut sources_failed: Vec<SourceFailure> = Vec::new();

        for (source_id, handle) in handles {
            match handle.await {
                Ok(Ok(mut source_records)) => records.append(&mut source_records),
                Ok(Err(failure)) => sources_failed.push(failure),
                Err(e) => sources_failed.push(SourceFailure {
                    source: source_id,
                    error_message: format!("task aborted: {}", e),
                }),
            }
        }

        let before = records.len();
        let mut records = self.resolver.deduplicate(records, self.config.fuzzy_dedup);
        log::debug!(
            "🧬 Deduplicated {} → {} records ({} source failures)",
            before,
            records.len(),
            sources_failed.len()
        );
        records.truncate(limit);

        let partial = !sources_failed.is_empty();
        Ok(AggregationResult {
            records,
            sources_queried,
            sources_failed,
            partial,
        })
    }

    /// Merge leaderboards for one stat across sources
    ///
    /// Entries are deduplicated by player UID (the best value wins),
    /// re-ranked from 1, and truncated to `limit`.
    pub async fn leaderboard(
        &self,
        stat: &str,
        season: Option<&str>,
        limit: usize,
    ) -> Result<LeaderboardResult, AggregateError> {
        let targets = self.resolve_targets(None, Capability::Leaderboard)?;
        let sources_queried: Vec<String> = targets.iter().map(|(d, _)| d.id.clone()).collect();

        log::info!(
            "🏆 Fanning out leaderboard '{}' to {} source(s)",
            stat,
            targets.len()
        );

        let mut handles: Vec<(String, JoinHandle<Result<Vec<LeaderboardEntry>, SourceFailure>>)> =
            Vec::with_capacity(targets.len());

        for (descriptor, adapter) in targets {
            let source_id = descriptor.id.clone();
            let rate_limiter = Arc::clone(&self.rate_limiter);
            let cache = Arc::clone(&self.cache);
            let stat = stat.to_string();
            let season = season.map(|s| s.to_string());
            let per_source_cap = self.config.per_source_cap;
            let acquire_timeout = self.config.acquire_timeout;
            let ttl = self.config.ttl_for(CacheNamespace::Leaderboard);

            let task_source = source_id.clone();
            let handle = tokio::spawn(async move {
                fetch_leaderboard(
                    task_source,
                    adapter,
                    rate_limiter,
                    cache,
                    stat,
                    season,
                    per_source_cap,
                    acquire_timeout,
                    ttl,
                )
                .await
            });
            handles.push((source_id, handle));
        }

        let mut entries: Vec<LeaderboardEntry> = Vec::new();
        let mut sources_failed: Vec<SourceFailure> = Vec::new();

        for (source_id, handle) in handles {
            match handle.await {
                Ok(Ok(mut source_entries)) => entries.append(&mut source_entries),
                Ok(Err(failure)) => sources_failed.push(failure),
                Err(e) => sources_failed.push(SourceFailure {
                    source: source_id,
                    error_message: format!("task aborted: {}", e),
                }),
            }
        }

        // Best value per player; ties broken by first arrival
        let mut best: HashMap<String, LeaderboardEntry> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for mut entry in entries {
            entry.player.uid = self.resolver.resolve_record_uid(&entry.player);
            match best.entry(entry.player.uid.clone()) {
                Entry::Occupied(mut slot) => {
                    if entry.value > slot.get().value {
                        slot.insert(entry);
                    }
                }
                Entry::Vacant(slot) => {
                    order.push(entry.player.uid.clone());
                    slot.insert(entry);
                }
            }
        }

        let mut merged: Vec<LeaderboardEntry> =
            order.into_iter().filter_map(|uid| best.remove(&uid)).collect();
        merged.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(limit);
        for (i, entry) in merged.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }

        let partial = !sources_failed.is_empty();
        Ok(LeaderboardResult {
            entries: merged,
            sources_queried,
            sources_failed,
            partial,
        })
    }

    /// Season stats from one named source, with the same gating as a fan-out
    ///
    /// Unlike `search`, this is a single-source pass-through, so failure is
    /// surfaced directly as `SourceUnavailable`.
    pub async fn season_stats(
        &self,
        source_id: &str,
        player_id: &str,
        season: Option<&str>,
    ) -> Result<Option<StatsRecord>, AggregateError> {
        let (descriptor, adapter) = self
            .registry
            .get(source_id)
            .filter(|(d, _)| d.enabled && d.has_capability(Capability::SeasonStats))
            .ok_or(AggregateError::NoSourcesConfigured)?;
        let source = descriptor.id.clone();

        if !self
            .rate_limiter
            .acquire(&source, 1.0, Some(self.config.acquire_timeout))
            .await
        {
            return Err(AggregateError::SourceUnavailable {
                source,
                message: RATE_LIMIT_TIMEOUT_MSG.to_string(),
            });
        }

        let key = format!("{}:{}:{}", source, player_id, season.unwrap_or(""));
        if let Some(value) = self.cache.get(CacheNamespace::Stats, &key).await {
            if let Ok(cached) = serde_json::from_value::<Option<StatsRecord>>(value) {
                log::debug!("💾 Stats cache hit for {}", key);
                return Ok(cached);
            }
        }

        let stats = adapter
            .get_player_season_stats(player_id, season)
            .await
            .map_err(|e| AggregateError::SourceUnavailable {
                source: source.clone(),
                message: e.to_string(),
            })?;

        if let Ok(value) = serde_json::to_value(&stats) {
            self.cache
                .set(
                    CacheNamespace::Stats,
                    &key,
                    value,
                    self.config.ttl_for(CacheNamespace::Stats),
                )
                .await;
        }

        Ok(stats)
    }

    /// Probe every enabled adapter's reachability in parallel
    ///
    /// A probe that errors or panics reports `false`; siblings are
    /// unaffected. Off the query hot path, so no rate limiting or caching.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let targets = self.registry.enabled();
        let mut handles: Vec<(String, JoinHandle<bool>)> = Vec::with_capacity(targets.len());

        for (descriptor, adapter) in targets {
            let source_id = descriptor.id.clone();
            let handle = tokio::spawn(async move { adapter.health_check().await });
            handles.push((source_id, handle));
        }

        let mut statuses = HashMap::new();
        for (source_id, handle) in handles {
            let healthy = handle.await.unwrap_or(false);
            if !healthy {
                log::warn!("🩺 Source '{}' failed health check", source_id);
            }
            statuses.insert(source_id, healthy);
        }
        statuses
    }

    /// Close every registered adapter, logging and continuing on error
    pub async fn close_all(&self) {
        for (descriptor, adapter) in self.registry.enabled() {
            if let Err(e) = adapter.close().await {
                log::warn!("⚠️  Failed to close source '{}': {}", descriptor.id, e);
            }
        }
        log::info!("👋 All sources closed");
    }

    /// Resolve the target set: explicit ids ∩ enabled ∩ capability
    fn resolve_targets(
        &self,
        explicit: Option<&[String]>,
        capability: Capability,
    ) -> Result<Vec<(crate::source::SourceDescriptor, Arc<dyn SourceAdapter>)>, AggregateError>
    {
        let mut targets = self.registry.enabled_with(capability);
        if let Some(ids) = explicit {
            targets.retain(|(d, _)| ids.iter().any(|id| id == &d.id));
        }
        if targets.is_empty() {
            return Err(AggregateError::NoSourcesConfigured);
        }
        Ok(targets)
    }
}

/// One search task: rate-limit gate, cache probe, adapter call, cache fill
///
/// Returns a value either way; errors never cross the task boundary as
/// panics.
#[allow(clippy::too_many_arguments)]
async fn fetch_players(
    source: String,
    adapter: Arc<dyn SourceAdapter>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    criteria: SearchCriteria,
    per_source_cap: usize,
    acquire_timeout: std::time::Duration,
    ttl: std::time::Duration,
) -> Result<Vec<PlayerRecord>, SourceFailure> {
    if !rate_limiter.acquire(&source, 1.0, Some(acquire_timeout)).await {
        return Err(SourceFailure {
            source,
            error_message: RATE_LIMIT_TIMEOUT_MSG.to_string(),
        });
    }

    let key = format!("{}:{}", source, criteria.cache_key());
    if let Some(value) = cache.get(CacheNamespace::Player, &key).await {
        if let Ok(records) = serde_json::from_value::<Vec<PlayerRecord>>(value) {
            log::debug!("💾 Player cache hit for {}", key);
            return Ok(records);
        }
        // Cached shape no longer parses: fall through and refetch
    }

    let records = adapter
        .search_players(&criteria, per_source_cap)
        .await
        .map_err(|e| {
            log::warn!("❌ Source '{}' search failed: {}", source, e);
            SourceFailure {
                source: source.clone(),
                error_message: e.to_string(),
            }
        })?;

    if let Ok(value) = serde_json::to_value(&records) {
        cache.set(CacheNamespace::Player, &key, value, ttl).await;
    }

    Ok(records)
}

/// One leaderboard task, same gating as `fetch_players`
#[allow(clippy::too_many_arguments)]
async fn fetch_leaderboard(
    source: String,
    adapter: Arc<dyn SourceAdapter>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    stat: String,
    season: Option<String>,
    per_source_cap: usize,
    acquire_timeout: std::time::Duration,
    ttl: std::time::Duration,
) -> Result<Vec<LeaderboardEntry>, SourceFailure> {
    if !rate_limiter.acquire(&source, 1.0, Some(acquire_timeout)).await {
        return Err(SourceFailure {
            source,
            error_message: RATE_LIMIT_TIMEOUT_MSG.to_string(),
        });
    }

    let key = format!("{}:{}:{}", source, stat, season.as_deref().unwrap_or(""));
    if let Some(value) = cache.get(CacheNamespace::Leaderboard, &key).await {
        if let Ok(entries) = serde_json::from_value::<Vec<LeaderboardEntry>>(value) {
            log::debug!("💾 Leaderboard cache hit for {}", key);
            return Ok(entries);
        }
    }

    let entries = adapter
        .get_leaderboard(&stat, season.as_deref(), per_source_cap)
        .await
        .map_err(|e| {
            log::warn!("❌ Source '{}' leaderboard failed: {}", source, e);
            SourceFailure {
                source: source.clone(),
                error_message: e.to_string(),
            }
        })?;

    if let Ok(value) = serde_json::to_value(&entries) {
        cache.set(CacheNamespace::Leaderboard, &key, value, ttl).await;
    }

    Ok(entries)
}
