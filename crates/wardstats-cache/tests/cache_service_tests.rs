//! Behavioural tests for `CacheService` across both tiers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use wardstats_cache::region::{RARELY_UPDATED, WARD_STATISTICS};
use wardstats_cache::{
    CacheEntry, CacheRegions, CacheService, InMemorySharedCache, PayloadFormat, RegionPolicy,
    SharedCacheBackend, Tier,
};
use wardstats_core::clock::Clock;
use wardstats_test_support::{ManualClock, SlowSharedCache, UnavailableSharedCache};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    ward: String,
    population: i64,
}

fn summary() -> Summary {
    Summary {
        ward: "ward-7".to_owned(),
        population: 105,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn two_tier(clock: &Arc<ManualClock>) -> (CacheService, Arc<InMemorySharedCache>) {
    let shared = Arc::new(InMemorySharedCache::new());
    let cache = CacheService::new(CacheRegions::default(), Arc::clone(clock) as Arc<dyn Clock>)
        .with_shared_tier(Arc::clone(&shared) as Arc<dyn SharedCacheBackend>);
    (cache, shared)
}

#[tokio::test]
async fn test_put_then_get_hits_within_ttl() {
    // Arrange
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, _) = two_tier(&clock);

    // Act
    cache
        .put("stats:ward-7", &summary(), Some(Duration::from_secs(3600)), WARD_STATISTICS)
        .await;
    let found = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;

    // Assert
    assert_eq!(found, Some(summary()));
    let stats = cache.get_statistics().await;
    assert_eq!(stats[&Tier::Local].hits, 1);
    assert_eq!(stats[&Tier::Shared].hits, 0);
}

#[tokio::test]
async fn test_ttl_boundary_hit_before_miss_after() {
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, _) = two_tier(&clock);
    cache
        .put("stats:ward-7", &summary(), Some(Duration::from_secs(3600)), WARD_STATISTICS)
        .await;

    clock.set(t0() + TimeDelta::seconds(3600) - TimeDelta::milliseconds(1));
    assert_eq!(
        cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await,
        Some(summary())
    );

    clock.set(t0() + TimeDelta::seconds(3600));
    assert_eq!(cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await, None);

    clock.set(t0() + TimeDelta::seconds(3601));
    assert_eq!(cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await, None);
}

#[tokio::test]
async fn test_default_ttl_comes_from_region() {
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, shared) = two_tier(&clock);

    cache.put("stats:ward-7", &summary(), None, WARD_STATISTICS).await;

    let entry = shared
        .get(WARD_STATISTICS, "stats:ward-7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.ttl_seconds, 24 * 60 * 60);
    assert_eq!(entry.created_at, t0());
}

#[tokio::test]
async fn test_shared_hit_repopulates_local_with_remaining_ttl() {
    // Arrange: another process wrote the entry 50 minutes ago.
    let clock = Arc::new(ManualClock::new(t0() + TimeDelta::minutes(50)));
    let (cache, shared) = two_tier(&clock);
    shared
        .put(CacheEntry {
            key: "stats:ward-7".to_owned(),
            value: serde_json::to_vec(&summary()).unwrap(),
            region: WARD_STATISTICS.to_owned(),
            created_at: t0(),
            ttl_seconds: 3600,
        })
        .await
        .unwrap();

    // Act
    let first = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;
    shared.remove(WARD_STATISTICS, "stats:ward-7").await.unwrap();
    let second = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;
    clock.set(t0() + TimeDelta::minutes(60));
    let after_expiry = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;

    // Assert
    assert_eq!(first, Some(summary()));
    assert_eq!(second, Some(summary()));
    assert_eq!(after_expiry, None);
    let stats = cache.get_statistics().await;
    assert_eq!(stats[&Tier::Shared].hits, 1);
    assert_eq!(stats[&Tier::Local].hits, 1);
}

#[tokio::test]
async fn test_expired_shared_entry_is_never_served() {
    let clock = Arc::new(ManualClock::new(t0() + TimeDelta::hours(2)));
    let (cache, shared) = two_tier(&clock);
    shared
        .put(CacheEntry {
            key: "k".to_owned(),
            value: serde_json::to_vec(&summary()).unwrap(),
            region: WARD_STATISTICS.to_owned(),
            created_at: t0(),
            ttl_seconds: 3600,
        })
        .await
        .unwrap();

    assert_eq!(cache.get::<Summary>("k", WARD_STATISTICS).await, None);
}

#[tokio::test]
async fn test_unavailable_shared_tier_degrades_to_local() {
    // Arrange
    let clock = Arc::new(ManualClock::new(t0()));
    let cache = CacheService::new(CacheRegions::default(), Arc::clone(&clock) as Arc<dyn Clock>)
        .with_shared_tier(Arc::new(UnavailableSharedCache));

    // Act
    cache.put("stats:ward-7", &summary(), None, WARD_STATISTICS).await;
    let hit = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;
    let miss = cache.get::<Summary>("stats:ward-8", WARD_STATISTICS).await;
    cache.invalidate("stats:ward-7", WARD_STATISTICS).await;
    let report = cache.cleanup_expired_entries().await;

    // Assert
    assert_eq!(hit, Some(summary()));
    assert_eq!(miss, None);
    assert_eq!(report.shared, 0);
    let stats = cache.get_statistics().await;
    let shared = &stats[&Tier::Shared];
    assert_eq!(shared.entries, None);
    // put, get(ward-8), invalidate, cleanup, count
    assert_eq!(shared.errors, 5);
}

#[tokio::test]
async fn test_invalidate_removes_from_both_tiers() {
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, shared) = two_tier(&clock);
    cache.put("stats:ward-7", &summary(), None, WARD_STATISTICS).await;

    cache.invalidate("stats:ward-7", WARD_STATISTICS).await;

    assert_eq!(cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await, None);
    assert_eq!(shared.entry_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_cleanup_removes_expired_and_keeps_live_entries() {
    // Arrange
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, shared) = two_tier(&clock);
    cache
        .put("short", &1_u32, Some(Duration::from_secs(60)), WARD_STATISTICS)
        .await;
    cache
        .put("long", &2_u32, Some(Duration::from_secs(600)), WARD_STATISTICS)
        .await;

    // Act
    clock.advance(TimeDelta::seconds(59));
    let early = cache.cleanup_expired_entries().await;
    clock.advance(TimeDelta::seconds(1));
    let due = cache.cleanup_expired_entries().await;

    // Assert
    assert_eq!(early.total(), 0);
    assert_eq!(due.local, 1);
    assert_eq!(due.shared, 1);
    assert_eq!(shared.entry_count().await.unwrap(), 1);
    assert_eq!(cache.get::<u32>("long", WARD_STATISTICS).await, Some(2));
}

#[tokio::test]
async fn test_yaml_region_is_stored_as_yaml() {
    let clock = Arc::new(ManualClock::new(t0()));
    let regions = CacheRegions::default().with_region(
        RARELY_UPDATED,
        RegionPolicy::new(7 * 24 * 3600).with_format(PayloadFormat::Yaml),
    );
    let shared = Arc::new(InMemorySharedCache::new());
    let cache = CacheService::new(regions, Arc::clone(&clock) as Arc<dyn Clock>)
        .with_shared_tier(Arc::clone(&shared) as Arc<dyn SharedCacheBackend>);

    cache.put("trend:2026-01-01", &summary(), None, RARELY_UPDATED).await;

    let entry = shared
        .get(RARELY_UPDATED, "trend:2026-01-01")
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8(entry.value).unwrap();
    assert!(text.contains("population: 105"));
}

#[tokio::test]
async fn test_unknown_region_uses_fallback_policy() {
    let clock = Arc::new(ManualClock::new(t0()));
    let (cache, shared) = two_tier(&clock);

    cache.put("k", &summary(), None, "survey_results").await;

    let entry = shared.get("survey_results", "k").await.unwrap().unwrap();
    assert_eq!(entry.ttl_seconds, 3600);
    assert_eq!(cache.get::<Summary>("k", "survey_results").await, Some(summary()));
}

#[tokio::test]
async fn test_stalled_shared_tier_times_out_and_degrades_to_local() {
    // Arrange
    let clock = Arc::new(ManualClock::new(t0()));
    let cache = CacheService::new(CacheRegions::default(), Arc::clone(&clock) as Arc<dyn Clock>)
        .with_shared_tier(Arc::new(SlowSharedCache::new(Duration::from_secs(5))))
        .with_shared_timeout(Duration::from_millis(50));
    let started = std::time::Instant::now();

    // Act
    let missed = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;
    cache.put("stats:ward-7", &summary(), None, WARD_STATISTICS).await;
    let found = cache.get::<Summary>("stats:ward-7", WARD_STATISTICS).await;

    // Assert
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(missed, None);
    assert_eq!(found, Some(summary()));
    let shared = &cache.get_statistics().await[&Tier::Shared];
    assert_eq!(shared.errors, 3);
    assert_eq!(shared.entries, None);
}
