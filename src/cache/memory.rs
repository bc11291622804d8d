//! In-memory cache backend
//!
//! Default backend: a `HashMap` behind a short-critical-section mutex.
//! Entries live for the process lifetime unless evicted or cleared.

use super::backend::{CacheBackend, CacheBackendError, CacheEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn store(&self, namespace: &str, entry: CacheEntry) -> Result<(), CacheBackendError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((namespace.to_string(), entry.key.clone()), entry);
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), CacheBackendError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheBackendError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, CacheBackendError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
