//! TTL response cache fronting expensive adapter calls
//!
//! One namespace per artifact kind (player search, stats, leaderboards, raw
//! pages). Expiry is lazy: an expired entry is a miss, and the miss
//! proactively removes it. No background sweep is required, though
//! `purge_expired` exists as an optimization hook for long-running hosts.
//!
//! Backend faults (disk errors, corrupt rows) are logged and downgraded to
//! a miss or a dropped write. A request never fails because the cache did.

pub mod backend;
pub mod disabled;
pub mod memory;
pub mod sqlite;

pub use backend::{CacheBackend, CacheBackendError, CacheEntry};
pub use disabled::DisabledCache;
pub use memory::MemoryCacheBackend;
pub use sqlite::SqliteCacheBackend;

use std::time::Duration;

/// Closed set of cache namespaces, one per artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Player,
    Stats,
    Leaderboard,
    RawPage,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Player => "player",
            CacheNamespace::Stats => "stats",
            CacheNamespace::Leaderboard => "leaderboard",
            CacheNamespace::RawPage => "raw_page",
        }
    }
}

/// TTL-keyed store over a pluggable backend
///
/// Shared process-wide via `Arc`; constructed once at startup and injected
/// into the aggregator. The clock is injectable for expiry tests.
pub struct ResponseCache {
    backend: Box<dyn CacheBackend>,
    /// Epoch milliseconds
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl ResponseCache {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self::with_now_fn(backend, Box::new(|| chrono::Utc::now().timestamp_millis()))
    }

    /// Create a cache with a custom clock (used by expiry tests)
    pub fn with_now_fn(
        backend: Box<dyn CacheBackend>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        log::debug!("🗄️  Response cache using '{}' backend", backend.backend_type());
        Self { backend, now_fn }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCacheBackend::new()))
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(DisabledCache))
    }

    /// Look up a value; expired or corrupt entries are misses
    ///
    /// An expired entry is removed on the way out (lazy eviction).
    pub async fn get(&self, namespace: CacheNamespace, key: &str) -> Option<serde_json::Value> {
        let ns = namespace.as_str();
        let entry = match self.backend.load(ns, key).await {
            Ok(entry) => entry?,
            Err(e) => {
                log::warn!("⚠️  Cache load failed for {}:{} ({}), treating as miss", ns, key, e);
                return None;
            }
        };

        let now = (self.now_fn)();
        if now >= entry.expires_at {
            if let Err(e) = self.backend.remove(ns, key).await {
                log::warn!("⚠️  Failed to evict expired entry {}:{}: {}", ns, key, e);
            }
            return None;
        }

        Some(entry.value)
    }

    /// Store a value with `expires_at = now + ttl`, overwriting any
    /// existing entry for the key
    pub async fn set(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) {
        let now = (self.now_fn)();
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            created_at: now,
            expires_at: now + ttl.as_millis() as i64,
        };
        if let Err(e) = self.backend.store(namespace.as_str(), entry).await {
            log::warn!(
                "⚠️  Cache store failed for {}:{} ({}), continuing uncached",
                namespace.as_str(),
                key,
                e
            );
        }
    }

    /// Remove all entries in every namespace
    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            log::warn!("⚠️  Cache clear failed: {}", e);
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = (self.now_fn)();
        match self.backend.purge_expired(now).await {
            Ok(dropped) => {
                if dropped > 0 {
                    log::debug!("🧹 Purged {} expired cache entries", dropped);
                }
                dropped
            }
            Err(e) => {
                log::warn!("⚠️  Cache purge failed: {}", e);
                0
            }
        }
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }
}
