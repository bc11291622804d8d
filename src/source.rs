//! Source adapter contract and registry
//!
//! Every datasource (scraper, API client, fixture set) plugs in through the
//! one `SourceAdapter` trait. The registry pairs each adapter with its
//! immutable descriptor and answers "which enabled sources can serve this
//! operation". Capability checks are explicit flags, never runtime
//! attribute probing.
//!
//! The registry is built once at startup and injected into the aggregator;
//! it is read-only afterwards.

use crate::error::SourceError;
use crate::records::{LeaderboardEntry, PlayerRecord, SearchCriteria, StatsRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Closed set of operations a source can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    PlayerSearch,
    SeasonStats,
    Leaderboard,
}

/// Static description of one registered source
///
/// Owned by configuration, immutable after registry load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub display_name: String,
    pub capabilities: Vec<Capability>,
    pub base_url: String,
    pub enabled: bool,
}

impl SourceDescriptor {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Uniform contract every datasource must satisfy
///
/// Any method may fail; the aggregator records the failure against the
/// source and continues. Implementations must not panic on bad upstream
/// data; return an error instead.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Search players matching the criteria, up to `limit` records
    async fn search_players(
        &self,
        criteria: &SearchCriteria,
        limit: usize,
    ) -> Result<Vec<PlayerRecord>, SourceError>;

    /// Season stats for one player, `None` if the source has no data
    async fn get_player_season_stats(
        &self,
        player_id: &str,
        season: Option<&str>,
    ) -> Result<Option<StatsRecord>, SourceError>;

    /// Top `limit` entries for one stat
    async fn get_leaderboard(
        &self,
        stat: &str,
        season: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, SourceError>;

    /// Lightweight reachability probe, off the query hot path
    async fn health_check(&self) -> bool;

    /// Release held resources; safe to call even if never opened
    async fn close(&self) -> Result<(), SourceError>;
}

/// Registry of `(descriptor, adapter)` pairs
///
/// Iteration order is registration order, which keeps `sources_queried`
/// listings deterministic.
pub struct SourceRegistry {
    sources: Vec<(SourceDescriptor, Arc<dyn SourceAdapter>)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source; a duplicate id replaces the earlier entry
    pub fn register(&mut self, descriptor: SourceDescriptor, adapter: Arc<dyn SourceAdapter>) {
        if let Some(existing) = self.sources.iter_mut().find(|(d, _)| d.id == descriptor.id) {
            log::warn!("⚠️  Source '{}' registered twice, replacing", descriptor.id);
            *existing = (descriptor, adapter);
            return;
        }
        log::info!(
            "📡 Registered source '{}' ({}), enabled: {}",
            descriptor.id,
            descriptor.display_name,
            descriptor.enabled
        );
        self.sources.push((descriptor, adapter));
    }

    pub fn get(&self, id: &str) -> Option<(&SourceDescriptor, Arc<dyn SourceAdapter>)> {
        self.sources
            .iter()
            .find(|(d, _)| d.id == id)
            .map(|(d, a)| (d, Arc::clone(a)))
    }

    /// Enabled sources that carry the given capability
    pub fn enabled_with(
        &self,
        capability: Capability,
    ) -> Vec<(SourceDescriptor, Arc<dyn SourceAdapter>)> {
        self.sources
            .iter()
            .filter(|(d, _)| d.enabled && d.has_capability(capability))
            .map(|(d, a)| (d.clone(), Arc::clone(a)))
            .collect()
    }

    /// All enabled sources regardless of capability
    pub fn enabled(&self) -> Vec<(SourceDescriptor, Arc<dyn SourceAdapter>)> {
        self.sources
            .iter()
            .filter(|(d, _)| d.enabled)
            .map(|(d, a)| (d.clone(), Arc::clone(a)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
