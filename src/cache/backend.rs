//! Cache backend trait and storage errors
//!
//! One contract, several stores: in-memory (default), SQLite (survives
//! restarts), and disabled (no-op). Backend faults are internal: the
//! fronting `ResponseCache` logs them and degrades to a miss, never
//! surfacing them to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored cache value with its expiry bounds (epoch milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug)]
pub enum CacheBackendError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for CacheBackendError {
    fn from(err: std::io::Error) -> Self {
        CacheBackendError::Io(err)
    }
}

impl From<serde_json::Error> for CacheBackendError {
    fn from(err: serde_json::Error) -> Self {
        CacheBackendError::Serialization(err)
    }
}

impl From<rusqlite::Error> for CacheBackendError {
    fn from(err: rusqlite::Error) -> Self {
        CacheBackendError::Database(err.to_string())
    }
}

impl std::fmt::Display for CacheBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendError::Io(e) => write!(f, "IO error: {}", e),
            CacheBackendError::Serialization(e) => write!(f, "Serialization error: {}", e),
            CacheBackendError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for CacheBackendError {}

/// Storage contract behind `ResponseCache`
///
/// Implementations must tolerate concurrent access; last write wins on
/// overlapping `store` calls for the same key. Expiry is judged by the
/// front, not the backend; `load` returns whatever is stored.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Load the entry for `(namespace, key)`, if any
    ///
    /// A corrupt entry should be deleted and reported as `Ok(None)`.
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>, CacheBackendError>;

    /// Store an entry, replacing any existing one for the same key
    async fn store(&self, namespace: &str, entry: CacheEntry) -> Result<(), CacheBackendError>;

    /// Remove one entry; removing a missing entry is not an error
    async fn remove(&self, namespace: &str, key: &str) -> Result<(), CacheBackendError>;

    /// Remove every entry in every namespace
    async fn clear(&self) -> Result<(), CacheBackendError>;

    /// Remove entries expired as of `now`, returning how many were dropped
    async fn purge_expired(&self, now: i64) -> Result<usize, CacheBackendError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
