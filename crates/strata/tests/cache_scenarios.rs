//! End-to-end scenarios exercising both tiers together: promotion,
//! cascading eviction, tie-breaking, TTL expiry, schema cleanup, and
//! persistence across reopen.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata::{CacheConfig, Cacheable, TieredCache};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    body: String,
}

impl Report {
    fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

impl Cacheable for Report {
    fn schema_version() -> &'static str {
        "1.0.0"
    }
}

/// The limit profile shared by the scenarios: two memory slots, four disk
/// slots, generous byte budgets, short memory TTL, longer disk TTL.
fn scenario_config() -> CacheConfig {
    CacheConfig::default()
        .with_max_memory_items(2)
        .with_max_disk_items(4)
        .with_memory_ttl_seconds(10.0)
        .with_disk_ttl_seconds(100.0)
        .with_max_item_size_bytes(1024)
}

#[test]
fn put_then_get_hits_memory() {
    let cache = TieredCache::open_in_memory(scenario_config()).unwrap();

    cache.put_at("a", Report::new("r1"), 1.0).unwrap();
    let hit = cache.get_at("a", 2.0).unwrap().unwrap();
    assert_eq!(*hit, Report::new("r1"));

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.total_puts, 1);
    assert_eq!(stats.total_gets, 1);
    assert_eq!(stats.current_memory_items, 1);
    assert_eq!(stats.current_disk_items, 1);
}

#[test]
fn disk_hit_promotes_and_evicts_memory_eldest() {
    let cache = TieredCache::open_in_memory(scenario_config()).unwrap();

    cache.put_at("a", Report::new("r1"), 1.0).unwrap();
    cache.put_at("b", Report::new("r2"), 2.0).unwrap();
    cache.put_at("c", Report::new("r3"), 3.0).unwrap();

    // Memory holds the two newest (b, c); disk holds all three.
    let before = cache.get_stats().unwrap();
    assert_eq!(before.current_memory_items, 2);
    assert_eq!(before.current_disk_items, 3);

    let hit = cache.get_at("a", 4.0).unwrap().unwrap();
    assert_eq!(*hit, Report::new("r1"));

    let after = cache.get_stats().unwrap();
    assert_eq!(after.disk_hits, 1);
    assert_eq!(after.memory_hits, 0);
    // Promoting "a" pushed out the memory eldest ("b", stamped 2.0).
    assert_eq!(after.memory_evictions - before.memory_evictions, 1);
    assert_eq!(after.current_memory_items, 2);

    // "b" is still on disk; the memory eviction never cascades downward.
    assert!(cache.exists_at("b", 4.5).unwrap());
}

#[test]
fn disk_eviction_cascades_into_memory() {
    let config = scenario_config().with_max_disk_items(2);
    let cache = TieredCache::open_in_memory(config).unwrap();

    cache.put_at("a", Report::new("r1"), 1.0).unwrap();
    cache.put_at("b", Report::new("r2"), 2.0).unwrap();
    cache.put_at("c", Report::new("r3"), 3.0).unwrap();

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.disk_evictions, 1);
    assert_eq!(stats.memory_evictions, 1);
    assert_eq!(stats.current_disk_items, 2);
    assert_eq!(stats.current_memory_items, 2);

    // "a" was the disk victim and must be gone from both tiers; memory is a
    // subset of disk.
    assert!(!cache.exists_at("a", 4.0).unwrap());
    assert!(cache.exists_at("b", 4.0).unwrap());
    assert!(cache.exists_at("c", 4.0).unwrap());
}

#[test]
fn equal_timestamps_evict_in_key_order() {
    let config = scenario_config()
        .with_max_memory_items(2)
        .with_max_disk_items(2);
    let cache = TieredCache::open_in_memory(config).unwrap();

    cache.put_at("b", Report::new("r"), 5.0).unwrap();
    cache.put_at("a", Report::new("r"), 5.0).unwrap();

    // Both tiers at capacity; the next put must evict "a" before "b".
    cache.put_at("c", Report::new("r"), 6.0).unwrap();

    assert!(!cache.exists_at("a", 6.5).unwrap());
    assert!(cache.exists_at("b", 6.5).unwrap());
    assert!(cache.exists_at("c", 6.5).unwrap());
}

#[test]
fn memory_expiry_falls_back_to_live_disk_entry() {
    let cache = TieredCache::open_in_memory(scenario_config()).unwrap();

    cache.put_at("a", Report::new("r"), 0.0).unwrap();

    // Past the memory TTL (10) but within the disk TTL (100): the entry is
    // dropped from memory, served from disk, and promoted back.
    let hit = cache.get_at("a", 11.0).unwrap().unwrap();
    assert_eq!(*hit, Report::new("r"));

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.memory_hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.current_memory_items, 1);
}

#[test]
fn mismatched_schema_rows_are_dropped_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache: TieredCache<Report> =
            TieredCache::open(&path, scenario_config()).unwrap();
        cache.put_at("old", Report::new("stale"), 1.0).unwrap();
        cache.put_at("new", Report::new("fresh"), 2.0).unwrap();
        cache.close().unwrap();
    }

    // Rewrite one row as if it came from an earlier release.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE cache SET schema_version = '0.9.0' WHERE key = 'old'",
            [],
        )
        .unwrap();
    }

    let cache: TieredCache<Report> = TieredCache::open(&path, scenario_config()).unwrap();
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.current_disk_items, 1);

    assert!(cache.get_at("old", 3.0).unwrap().is_none());
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.misses, 1);

    let hit = cache.get_at("new", 3.0).unwrap().unwrap();
    assert_eq!(*hit, Report::new("fresh"));
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache: TieredCache<Report> =
            TieredCache::open(&path, scenario_config()).unwrap();
        cache.put_at("a", Report::new("persisted"), 1.0).unwrap();
        cache.close().unwrap();
    }

    let cache: TieredCache<Report> = TieredCache::open(&path, scenario_config()).unwrap();

    // Memory starts empty after reopen, so the first read is a disk hit.
    let hit = cache.get_at("a", 2.0).unwrap().unwrap();
    assert_eq!(*hit, Report::new("persisted"));
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.disk_hits, 1);
}

#[test]
fn reopen_trims_to_tighter_limits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache: TieredCache<Report> =
            TieredCache::open(&path, scenario_config()).unwrap();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.put_at(key, Report::new("r"), i as f64).unwrap();
        }
        cache.close().unwrap();
    }

    let tight = scenario_config().with_max_disk_items(2);
    let cache: TieredCache<Report> = TieredCache::open(&path, tight).unwrap();

    // Initialization trimmed the two eldest rows without touching the
    // ledger.
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.current_disk_items, 2);
    assert_eq!(stats.disk_evictions, 0);
    assert!(!cache.exists_at("a", 10.0).unwrap());
    assert!(!cache.exists_at("b", 10.0).unwrap());
    assert!(cache.exists_at("c", 10.0).unwrap());
    assert!(cache.exists_at("d", 10.0).unwrap());
}

#[test]
fn size_budget_bounds_both_tiers_after_every_put() {
    // Every record encodes to the same size; budget four of them on disk,
    // two in memory.
    let record = Report::new("xxxxxxxx");
    let size = record.encode().unwrap().len() as u64;
    let config = CacheConfig::default()
        .with_max_memory_items(100)
        .with_max_disk_items(100)
        .with_max_memory_size_bytes(2 * size)
        .with_max_disk_size_bytes(4 * size)
        .with_memory_ttl_seconds(1_000.0)
        .with_disk_ttl_seconds(1_000.0);
    let cache = TieredCache::open_in_memory(config).unwrap();

    for i in 0..10 {
        let key = format!("key-{i:02}");
        cache.put_at(&key, record.clone(), i as f64).unwrap();

        let stats = cache.get_stats().unwrap();
        assert!(stats.current_disk_items <= 4);
        assert!(stats.current_memory_items <= 2);
        assert!(cache.get_total_size().unwrap() <= 4 * size);
    }

    // Ten puts into four slots: six disk evictions, eldest first.
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.disk_evictions, 6);
    assert!(!cache.exists_at("key-05", 20.0).unwrap());
    assert!(cache.exists_at("key-06", 20.0).unwrap());
}

#[test]
fn batch_operations_round_trip() {
    let cache = TieredCache::open_in_memory(scenario_config()).unwrap();

    cache
        .put_many_at(
            vec![
                ("a".to_string(), Report::new("1")),
                ("b".to_string(), Report::new("2")),
                ("c".to_string(), Report::new("3")),
            ],
            1.0,
        )
        .unwrap();

    let keys: Vec<String> = ["a", "b", "c", "ghost"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let found = cache.get_many_at(&keys, 2.0).unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found["b"].body, "2");

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.total_puts, 3);
    assert_eq!(stats.total_gets, 4);
    assert_eq!(stats.misses, 1);

    cache
        .delete_many(&["a".to_string(), "c".to_string()])
        .unwrap();
    assert_eq!(cache.get_count().unwrap(), 1);
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.total_deletes, 2);
}

#[test]
fn batch_put_evicts_once_after_all_inserts() {
    let config = scenario_config().with_max_disk_items(2);
    let cache = TieredCache::open_in_memory(config).unwrap();

    cache
        .put_many_at(
            vec![
                ("a".to_string(), Report::new("1")),
                ("b".to_string(), Report::new("2")),
                ("c".to_string(), Report::new("3")),
                ("d".to_string(), Report::new("4")),
            ],
            5.0,
        )
        .unwrap();

    // All four share the batch timestamp; the tie-break leaves the two
    // lexicographically greatest keys.
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.current_disk_items, 2);
    assert_eq!(stats.disk_evictions, 2);
    assert!(!cache.exists_at("a", 6.0).unwrap());
    assert!(!cache.exists_at("b", 6.0).unwrap());
    assert!(cache.exists_at("c", 6.0).unwrap());
    assert!(cache.exists_at("d", 6.0).unwrap());
}

#[test]
fn concurrent_writers_and_readers_stay_consistent() {
    let config = CacheConfig::default()
        .with_max_memory_items(8)
        .with_max_disk_items(128)
        .with_memory_ttl_seconds(1_000.0)
        .with_disk_ttl_seconds(1_000.0);
    let cache = Arc::new(TieredCache::open_in_memory(config).unwrap());

    let mut handles = Vec::new();
    for t in 0..4 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                let key = format!("t{t}-{i}");
                cache.put(&key, Report::new("payload")).unwrap();
                let hit = cache.get(&key).unwrap();
                assert!(hit.is_some());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.total_puts, 100);
    assert_eq!(stats.total_gets, 100);
    assert_eq!(stats.memory_hits + stats.disk_hits, 100);
    assert_eq!(stats.current_disk_items, 100);
    assert_eq!(stats.current_disk_items, cache.get_count().unwrap());
}
