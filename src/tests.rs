use crate::cache::{CacheNamespace, MemoryCacheBackend, ResponseCache};
use crate::config::{AggregatorConfig, CacheBackendKind};
use crate::identity::{normalize_name, normalize_school, IdentityResolver};
use crate::rate_limit::{RateLimiter, TokenBucket};
use crate::records::PlayerRecord;
use serde_json::json;
use std::time::{Duration, Instant};

fn record(name: &str, school: Option<&str>, grad_year: Option<u16>, source: &str) -> PlayerRecord {
    PlayerRecord {
        uid: String::new(),
        name: name.to_string(),
        school: school.map(|s| s.to_string()),
        grad_year,
        position: None,
        team: None,
        source: source.to_string(),
        extra: serde_json::Value::Null,
    }
}

// ── Token bucket ────────────────────────────────────────────────────────

/// Tokens never exceed capacity or go negative across any take sequence
#[test]
fn test_bucket_tokens_stay_in_bounds() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(10, start);

    // Long idle must not overfill
    bucket.refill(start + Duration::from_secs(3600));
    assert!(bucket.remaining() <= bucket.capacity());
    assert_eq!(bucket.remaining(), 10.0);

    // Drain completely; a failed take must not go negative
    for i in 0..10 {
        assert!(bucket.try_take(1.0, start), "take {} should succeed", i);
    }
    assert!(!bucket.try_take(1.0, start));
    assert!(bucket.remaining() >= 0.0);
    assert!(bucket.remaining() < 1.0);
}

#[test]
fn test_bucket_refill_rate() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(60, start);

    for _ in 0..60 {
        assert!(bucket.try_take(1.0, start));
    }
    assert!(!bucket.try_take(1.0, start));

    // 60/min refills one token per second
    assert!(bucket.try_take(1.0, start + Duration::from_secs(1)));
    assert!(!bucket.try_take(1.0, start + Duration::from_secs(1)));
}

#[test]
fn test_bucket_time_until_available() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(10, start);

    assert_eq!(bucket.time_until_available(1.0), Duration::ZERO);

    for _ in 0..10 {
        bucket.try_take(1.0, start);
    }
    // refill rate = 10/60 per sec, so one token takes 6s
    let wait = bucket.time_until_available(1.0);
    assert!(wait >= Duration::from_secs_f64(5.9) && wait <= Duration::from_secs_f64(6.1));
}

#[test]
fn test_bucket_zero_limit_never_refills() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(0, start);
    assert!(!bucket.try_take(1.0, start + Duration::from_secs(3600)));
    assert_eq!(bucket.time_until_available(1.0), Duration::MAX);
}

#[test]
fn test_bucket_reset_restores_capacity() {
    let start = Instant::now();
    let mut bucket = TokenBucket::new(5, start);
    for _ in 0..5 {
        bucket.try_take(1.0, start);
    }
    assert_eq!(bucket.requests_made(), 5);

    bucket.reset(start);
    assert_eq!(bucket.remaining(), 5.0);
    assert_eq!(bucket.requests_made(), 0);
}

// ── Rate limiter ────────────────────────────────────────────────────────

/// Burst scenario: 10 immediate acquires succeed, the 11th with timeout=0
/// returns false without blocking
#[tokio::test]
async fn test_limiter_burst_then_limited() {
    let limiter = RateLimiter::new(60);
    limiter.configure("src", 10).await;

    for i in 0..10 {
        assert!(
            limiter.acquire("src", 1.0, Some(Duration::ZERO)).await,
            "acquire {} should succeed",
            i
        );
    }

    let started = Instant::now();
    assert!(!limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);
    assert!(started.elapsed() < Duration::from_millis(100), "timeout=0 must not block");
}

#[tokio::test]
async fn test_limiter_unknown_source_uses_default_bucket() {
    let limiter = RateLimiter::new(2);

    assert!(limiter.acquire("never-configured", 1.0, Some(Duration::ZERO)).await);
    assert!(limiter.acquire("never-configured", 1.0, Some(Duration::ZERO)).await);
    // Default bucket drained (capacity 2)
    assert!(!limiter.acquire("never-configured", 1.0, Some(Duration::ZERO)).await);
}

#[tokio::test]
async fn test_limiter_status_snapshot() {
    let limiter = RateLimiter::new(60);
    limiter.configure("src", 10).await;
    assert!(limiter.acquire("src", 1.0, None).await);

    let status = limiter.status("src").await;
    assert_eq!(status.source, "src");
    assert_eq!(status.requests_made, 1);
    assert_eq!(status.requests_allowed, 10);
    assert_eq!(status.requests_remaining, 9);
    assert!(!status.is_limited);
}

#[tokio::test]
async fn test_limiter_reconfigure_resets_state() {
    let limiter = RateLimiter::new(60);
    limiter.configure("src", 1).await;
    assert!(limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);
    assert!(!limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);

    limiter.configure("src", 1).await;
    assert!(limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);
}

#[tokio::test]
async fn test_limiter_reset_refills_bucket() {
    let limiter = RateLimiter::new(60);
    limiter.configure("src", 3).await;
    for _ in 0..3 {
        assert!(limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);
    }
    assert!(!limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);

    limiter.reset("src").await;
    assert!(limiter.acquire("src", 1.0, Some(Duration::ZERO)).await);
}

// ── Identity resolution ─────────────────────────────────────────────────

#[test]
fn test_normalize_name_collapses_whitespace() {
    assert_eq!(normalize_name("  John   SMITH "), "john smith");
    assert_eq!(normalize_name("john smith"), "john smith");
}

#[test]
fn test_normalize_school_strips_suffixes() {
    assert_eq!(normalize_school("Lincoln High School"), "lincoln");
    assert_eq!(normalize_school("Lincoln HS"), "lincoln");
    assert_eq!(normalize_school("St Mary Academy"), "st mary");
    assert_eq!(normalize_school("Oak Hill Prep"), "oak hill");
    // A suffix word standing alone is kept
    assert_eq!(normalize_school("Prep"), "prep");
    // Names merely ending in the letters "hs" are untouched
    assert_eq!(normalize_school("Smiths"), "smiths");
}

/// Same player reported with different formatting resolves to one UID
#[test]
fn test_uid_formatting_invariance() {
    let resolver = IdentityResolver::new();
    let a = resolver.resolve_uid("John Smith", Some("Lincoln HS"), Some(2025));
    let b = resolver.resolve_uid("john   smith", Some("Lincoln High School"), Some(2025));
    assert_eq!(a, b);
}

#[test]
fn test_uid_is_pure_and_order_independent() {
    let r1 = IdentityResolver::new();
    let r2 = IdentityResolver::new();

    let uid_a1 = r1.resolve_uid("Jane Doe", Some("Oak Hill"), Some(2026));
    let _ = r1.resolve_uid("Someone Else", None, None);
    let uid_a2 = r1.resolve_uid("Jane Doe", Some("Oak Hill"), Some(2026));

    // Fresh resolver, different call order, same output
    let _ = r2.resolve_uid("Someone Else", None, None);
    let uid_b = r2.resolve_uid("Jane Doe", Some("Oak Hill"), Some(2026));

    assert_eq!(uid_a1, uid_a2);
    assert_eq!(uid_a1, uid_b);
}

#[test]
fn test_uid_missing_fields_degrade_to_unknown() {
    let resolver = IdentityResolver::new();
    let a = resolver.resolve_uid("John Smith", None, None);
    let b = resolver.resolve_uid("John Smith", Some("   "), None);
    // Blank school normalizes to the unknown placeholder
    assert_eq!(a, b);
}

#[test]
fn test_deduplicate_never_grows_and_uids_unique() {
    let resolver = IdentityResolver::new();
    let records = vec![
        record("John Smith", Some("Lincoln HS"), Some(2025), "a"),
        record("john smith", Some("Lincoln High School"), Some(2025), "b"),
        record("Jane Doe", Some("Oak Hill"), Some(2026), "a"),
    ];

    let deduped = resolver.deduplicate(records, false);
    assert_eq!(deduped.len(), 2);

    let uids: std::collections::HashSet<_> = deduped.iter().map(|r| r.uid.clone()).collect();
    assert_eq!(uids.len(), deduped.len());
    // First occurrence wins
    assert_eq!(deduped[0].source, "a");
}

#[test]
fn test_deduplicate_empty_input() {
    let resolver = IdentityResolver::new();
    assert!(resolver.deduplicate(Vec::new(), true).is_empty());
}

#[test]
fn test_fuzzy_match_catches_near_miss_spelling() {
    let resolver = IdentityResolver::new();
    let a = record("Jonathan Smithson", Some("Lincoln HS"), Some(2025), "a");
    let b = record("Jonathan Smithsen", Some("Lincoln High School"), Some(2025), "b");

    // Different exact UIDs, but fuzzy sees the same player
    assert_ne!(resolver.resolve_record_uid(&a), resolver.resolve_record_uid(&b));
    assert!(resolver.fuzzy_match(&a, &b));

    let deduped = resolver.deduplicate(vec![a, b], true);
    assert_eq!(deduped.len(), 1);
}

#[test]
fn test_fuzzy_match_rejects_grad_year_conflict() {
    let resolver = IdentityResolver::new();
    let a = record("Jonathan Smithson", Some("Lincoln HS"), Some(2025), "a");
    let b = record("Jonathan Smithson", Some("Lincoln HS"), Some(2026), "b");
    assert!(!resolver.fuzzy_match(&a, &b));
}

#[test]
fn test_fuzzy_match_allows_unknown_grad_year() {
    let resolver = IdentityResolver::new();
    let a = record("Jonathan Smithson", Some("Lincoln HS"), Some(2025), "a");
    let b = record("Jonathan Smithson", Some("Lincoln HS"), None, "b");
    assert!(resolver.fuzzy_match(&a, &b));
}

#[test]
fn test_fuzzy_match_rejects_different_names() {
    let resolver = IdentityResolver::new();
    let a = record("John Smith", Some("Lincoln HS"), Some(2025), "a");
    let b = record("Dave Jones", Some("Lincoln HS"), Some(2025), "b");
    assert!(!resolver.fuzzy_match(&a, &b));
}

/// Stricter thresholds reject pairs the defaults would merge
#[test]
fn test_custom_thresholds_tighten_fuzzy_matching() {
    let strict = IdentityResolver::with_thresholds(0.99, 0.99);
    let a = record("Jonathan Smithson", Some("Lincoln HS"), Some(2025), "a");
    let b = record("Jonathan Smithsen", Some("Lincoln High School"), Some(2025), "b");
    assert!(!strict.fuzzy_match(&a, &b));
}

/// Accepted policy: same name with no disambiguating data merges
#[test]
fn test_same_name_no_disambiguators_merges() {
    let resolver = IdentityResolver::new();
    let records = vec![
        record("John Smith", None, None, "a"),
        record("John Smith", None, None, "b"),
    ];
    assert_eq!(resolver.deduplicate(records, false).len(), 1);
}

// ── Response cache ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_hit_within_ttl() {
    let cache = ResponseCache::in_memory();
    cache
        .set(CacheNamespace::Player, "k", json!({"v": 1}), Duration::from_secs(60))
        .await;
    assert_eq!(
        cache.get(CacheNamespace::Player, "k").await,
        Some(json!({"v": 1}))
    );
}

#[tokio::test]
async fn test_cache_zero_ttl_always_misses() {
    let cache = ResponseCache::in_memory();
    cache
        .set(CacheNamespace::Player, "k", json!(1), Duration::ZERO)
        .await;
    assert_eq!(cache.get(CacheNamespace::Player, "k").await, None);
}

/// Entries are never returned after expires_at; expiry also evicts
#[tokio::test]
async fn test_cache_expiry_with_mock_clock() {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    let clock = Arc::new(AtomicI64::new(1_000));
    let clock_fn = Arc::clone(&clock);
    let backend = Box::new(MemoryCacheBackend::new());
    let cache = ResponseCache::with_now_fn(
        backend,
        Box::new(move || clock_fn.load(Ordering::SeqCst)),
    );

    cache
        .set(CacheNamespace::Stats, "k", json!("v"), Duration::from_millis(500))
        .await;
    assert!(cache.get(CacheNamespace::Stats, "k").await.is_some());

    clock.store(1_500, Ordering::SeqCst);
    assert!(cache.get(CacheNamespace::Stats, "k").await.is_none());
    // Lazy eviction removed the entry, not just hid it
    clock.store(0, Ordering::SeqCst);
    assert!(cache.get(CacheNamespace::Stats, "k").await.is_none());
}

#[tokio::test]
async fn test_cache_set_overwrites() {
    let cache = ResponseCache::in_memory();
    cache
        .set(CacheNamespace::Player, "k", json!(1), Duration::from_secs(60))
        .await;
    cache
        .set(CacheNamespace::Player, "k", json!(2), Duration::from_secs(60))
        .await;
    assert_eq!(cache.get(CacheNamespace::Player, "k").await, Some(json!(2)));
}

#[tokio::test]
async fn test_cache_namespaces_are_isolated() {
    let cache = ResponseCache::in_memory();
    cache
        .set(CacheNamespace::Player, "k", json!(1), Duration::from_secs(60))
        .await;
    assert_eq!(cache.get(CacheNamespace::Stats, "k").await, None);
}

#[tokio::test]
async fn test_cache_clear() {
    let cache = ResponseCache::in_memory();
    cache
        .set(CacheNamespace::Player, "k", json!(1), Duration::from_secs(60))
        .await;
    cache.clear().await;
    assert_eq!(cache.get(CacheNamespace::Player, "k").await, None);
}

#[tokio::test]
async fn test_disabled_cache_is_a_valid_noop() {
    let cache = ResponseCache::disabled();
    cache
        .set(CacheNamespace::Player, "k", json!(1), Duration::from_secs(60))
        .await;
    assert_eq!(cache.get(CacheNamespace::Player, "k").await, None);
    assert_eq!(cache.backend_type(), "disabled");
}

// ── Config ──────────────────────────────────────────────────────────────

#[test]
fn test_config_defaults() {
    let config = AggregatorConfig::default();
    assert_eq!(config.default_limit_per_minute, 60);
    assert_eq!(config.per_source_cap, 50);
    assert_eq!(config.cache_backend, CacheBackendKind::Memory);
    assert!(!config.fuzzy_dedup);
}

#[test]
fn test_config_builds_selected_cache_backend() {
    let memory = AggregatorConfig::default().build_cache().unwrap();
    assert_eq!(memory.backend_type(), "memory");

    let disabled = AggregatorConfig {
        cache_backend: CacheBackendKind::Disabled,
        ..Default::default()
    }
    .build_cache()
    .unwrap();
    assert_eq!(disabled.backend_type(), "disabled");
}

#[test]
fn test_config_ttl_per_namespace() {
    let config = AggregatorConfig::default();
    assert_eq!(config.ttl_for(CacheNamespace::Player), Duration::from_secs(900));
    assert_eq!(config.ttl_for(CacheNamespace::Stats), Duration::from_secs(3600));
    assert_eq!(config.ttl_for(CacheNamespace::Leaderboard), Duration::from_secs(600));
    assert_eq!(config.ttl_for(CacheNamespace::RawPage), Duration::from_secs(300));
}
