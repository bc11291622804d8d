//! No-op cache backend
//!
//! A disabled cache is still a valid cache: every `get` misses and every
//! `set` trivially succeeds. Caching is a pure optimization, never a
//! correctness dependency.

use super::backend::{CacheBackend, CacheBackendError, CacheEntry};
use async_trait::async_trait;

pub struct DisabledCache;

#[async_trait]
impl CacheBackend for DisabledCache {
    async fn load(&self, _namespace: &str, _key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        Ok(None)
    }

    async fn store(&self, _namespace: &str, _entry: CacheEntry) -> Result<(), CacheBackendError> {
        Ok(())
    }

    async fn remove(&self, _namespace: &str, _key: &str) -> Result<(), CacheBackendError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheBackendError> {
        Ok(())
    }

    async fn purge_expired(&self, _now: i64) -> Result<usize, CacheBackendError> {
        Ok(0)
    }

    fn backend_type(&self) -> &'static str {
        "disabled"
    }
}
