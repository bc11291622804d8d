//! SQLite cache backend
//!
//! Local-disk store so cached responses survive restarts. One table,
//! `(namespace, key)` primary key, values stored as JSON text. A row whose
//! value fails to parse is deleted and reported as a miss; corruption is
//! never surfaced as an error.

use super::backend::{CacheBackend, CacheBackendError, CacheEntry};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteCacheBackend {
    conn: Mutex<Connection>,
}

impl SqliteCacheBackend {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, CacheBackendError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS response_cache (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_expires ON response_cache(expires_at)",
            [],
        )?;

        log::info!("✅ SQLite response cache initialized (WAL mode)");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn load(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>, CacheBackendError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT value, created_at, expires_at FROM response_cache
                 WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (raw, created_at, expires_at) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(CacheEntry {
                key: key.to_string(),
                value,
                created_at,
                expires_at,
            })),
            Err(e) => {
                // Corrupt value: drop the row and treat as a miss
                log::warn!("⚠️  Corrupt cache row {}:{} ({}), removing", namespace, key, e);
                conn.execute(
                    "DELETE FROM response_cache WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                )?;
                Ok(None)
            }
        }
    }

    async fn store(&self, namespace: &str, entry: CacheEntry) -> Result<(), CacheBackendError> {
        let raw = serde_json::to_string(&entry.value)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO response_cache
             (namespace, key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![namespace, entry.key, raw, entry.created_at, entry.expires_at],
        )?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), CacheBackendError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM response_cache WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheBackendError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM response_cache", [])?;
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, CacheBackendError> {
        let conn = self.conn.lock().unwrap();
        let dropped = conn.execute(
            "DELETE FROM response_cache WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(dropped)
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
