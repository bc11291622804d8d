//! Token bucket primitive for one source
//!
//! Pure accounting: all time values are passed in by the caller, so tests
//! can drive refill with synthetic instants. The surrounding `RateLimiter`
//! owns the clock and the per-bucket mutex.

use std::time::{Duration, Instant};

/// Single-source token bucket
///
/// Burst capacity equals the per-minute limit; tokens refill continuously at
/// `limit / 60` per second. Invariant: `tokens` stays within
/// `[0.0, capacity]` across every operation.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    /// Tokens per second
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
    /// Successful takes since construction or reset
    requests_made: u64,
}

impl TokenBucket {
    pub fn new(limit_per_minute: u32, now: Instant) -> Self {
        let capacity = limit_per_minute as f64;
        Self {
            capacity,
            refill_rate: capacity / 60.0,
            tokens: capacity,
            last_refill: now,
            requests_made: 0,
        }
    }

    /// Credit tokens for the time elapsed since the last refill
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Refill, then take `tokens` if available
    ///
    /// Subtraction only happens on success, so a caller that gives up
    /// waiting never leaves the bucket partially decremented.
    pub fn try_take(&mut self, tokens: f64, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= tokens {
            self.tokens -= tokens;
            self.requests_made += 1;
            true
        } else {
            false
        }
    }

    /// Time until `tokens` would be available, assuming no other takers
    ///
    /// Returns zero when the tokens are already available, and a very long
    /// wait for a bucket that never refills (limit 0).
    pub fn time_until_available(&self, tokens: f64) -> Duration {
        let deficit = tokens - self.tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64(deficit / self.refill_rate)
    }

    /// Time until the bucket is back at full capacity
    pub fn time_until_full(&self) -> Duration {
        self.time_until_available(self.capacity)
    }

    /// Restore to full capacity and clear the request counter
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity;
        self.last_refill = now;
        self.requests_made = 0;
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn remaining(&self) -> f64 {
        self.tokens
    }

    pub fn requests_made(&self) -> u64 {
        self.requests_made
    }
}
