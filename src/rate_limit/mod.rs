//! Per-source request rate governance
//!
//! One token bucket per source, each behind its own async mutex so that
//! concurrent acquires on the same source are serialized (token accounting
//! never races on the float counter) while different sources proceed fully
//! in parallel.
//!
//! `acquire` never returns an error: an exhausted timeout yields `false`,
//! and an unknown source id falls back to a shared default bucket rather
//! than failing. The aggregator treats a `false` as "source unavailable for
//! this round".

pub mod bucket;

pub use bucket::TokenBucket;

use crate::records::RateLimitStatus;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;

/// Upper bound on a single sleep slice inside `acquire`
///
/// Waiting in bounded increments keeps the timeout check responsive even
/// when the computed refill wait is long.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(1);

/// Registry of per-source token buckets
///
/// Shared process-wide via `Arc`; constructed once at startup and injected
/// into the aggregator.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    /// Fallback bucket for source ids that were never configured
    default_bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Create a limiter whose default bucket allows `default_limit_per_minute`
    pub fn new(default_limit_per_minute: u32) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            default_bucket: Arc::new(Mutex::new(TokenBucket::new(
                default_limit_per_minute,
                Instant::now(),
            ))),
        }
    }

    /// Configure (or reconfigure) the bucket for one source
    ///
    /// Idempotent; reconfiguring replaces the bucket, which resets its
    /// tokens to full and clears the request counter.
    pub async fn configure(&self, source_id: &str, limit_per_minute: u32) {
        let bucket = Arc::new(Mutex::new(TokenBucket::new(limit_per_minute, Instant::now())));
        let mut buckets = self.buckets.write().await;
        buckets.insert(source_id.to_string(), bucket);
        log::debug!(
            "🪣 Configured rate limit for '{}': {}/min",
            source_id,
            limit_per_minute
        );
    }

    /// Acquire `tokens` from a source's bucket, waiting up to `timeout`
    ///
    /// `timeout == None` waits as long as it takes; `Some(Duration::ZERO)`
    /// never sleeps. Returns `false` if the deadline passes first. The
    /// bucket mutex is held across the whole acquire-or-wait loop, so one
    /// caller waits per source at a time.
    pub async fn acquire(&self, source_id: &str, tokens: f64, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let bucket = self.bucket_for(source_id).await;
        let mut bucket = bucket.lock().await;

        loop {
            let now = Instant::now();
            if bucket.try_take(tokens, now) {
                return true;
            }

            let wait = bucket.time_until_available(tokens);
            let mut slice = wait.min(MAX_WAIT_SLICE);
            if let Some(deadline) = deadline {
                if now >= deadline {
                    log::debug!("⏳ Rate limit timeout for '{}'", source_id);
                    return false;
                }
                slice = slice.min(deadline.saturating_duration_since(now));
                if slice.is_zero() {
                    log::debug!("⏳ Rate limit timeout for '{}'", source_id);
                    return false;
                }
            }
            sleep(slice).await;
        }
    }

    /// Snapshot one source's limiter state
    ///
    /// Read-only apart from the implicit refill.
    pub async fn status(&self, source_id: &str) -> RateLimitStatus {
        let bucket = self.bucket_for(source_id).await;
        let mut bucket = bucket.lock().await;
        bucket.refill(Instant::now());

        let until_full = bucket.time_until_full();
        let reset_at = Utc::now()
            + chrono::Duration::from_std(until_full).unwrap_or_else(|_| chrono::Duration::days(1));

        RateLimitStatus {
            source: source_id.to_string(),
            requests_made: bucket.requests_made(),
            requests_allowed: bucket.capacity() as u64,
            requests_remaining: bucket.remaining().floor() as u64,
            window_reset_at: reset_at,
            is_limited: bucket.remaining() < 1.0,
        }
    }

    /// Restore one source's bucket to full capacity
    pub async fn reset(&self, source_id: &str) {
        let bucket = self.bucket_for(source_id).await;
        bucket.lock().await.reset(Instant::now());
    }

    /// Restore every bucket (including the default) to full capacity
    pub async fn reset_all(&self) {
        let buckets = self.buckets.read().await;
        for bucket in buckets.values() {
            bucket.lock().await.reset(Instant::now());
        }
        self.default_bucket.lock().await.reset(Instant::now());
    }

    async fn bucket_for(&self, source_id: &str) -> Arc<Mutex<TokenBucket>> {
        let buckets = self.buckets.read().await;
        match buckets.get(source_id) {
            Some(bucket) => Arc::clone(bucket),
            None => Arc::clone(&self.default_bucket),
        }
    }
}
