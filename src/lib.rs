//! # statflow
//!
//! Concurrency-safe fan-out aggregation engine for sports-statistics
//! sources. Dozens of independent, rate-limited, often-unreliable scrapers
//! and APIs sit behind one uniform adapter trait; this crate coordinates
//! querying them in parallel, governs outbound request rates per source,
//! caches expensive responses, and merges the results into a single
//! deduplicated answer.
//!
//! ## Architecture
//!
//! ```text
//! caller
//!     ↓
//! Aggregator::search()
//!     ↓ fan-out (one task per enabled, capable source)
//! RateLimiter::acquire ──→ ResponseCache::get ──→ SourceAdapter call
//!     ↓ join all (every task settles, success or failure)
//! IdentityResolver::deduplicate
//!     ↓
//! AggregationResult { records, sources_failed, partial }
//! ```
//!
//! Failure model: one slow or broken source never blocks or fails the
//! overall call. Per-source faults are collected into the result's failure
//! report; the only hard error a caller sees is `NoSourcesConfigured`.
//!
//! Everything is dependency-injected: the bucket map, cache store, and
//! registry are explicit objects constructed at process start and shared
//! via `Arc`, never ambient globals.

#[cfg(test)]
mod tests;

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod rate_limit;
pub mod records;
pub mod source;

pub use aggregator::Aggregator;
pub use cache::{CacheNamespace, ResponseCache};
pub use config::{AggregatorConfig, CacheBackendKind};
pub use error::{AggregateError, SourceError};
pub use identity::IdentityResolver;
pub use rate_limit::{RateLimiter, TokenBucket};
pub use records::{
    AggregationResult, LeaderboardEntry, LeaderboardResult, PlayerRecord, RateLimitStatus,
    SearchCriteria, SourceFailure, StatsRecord,
};
pub use source::{Capability, SourceAdapter, SourceDescriptor, SourceRegistry};
