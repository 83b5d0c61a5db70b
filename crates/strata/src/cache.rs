//! Two-tier cache coordinator.
//!
//! Orchestrates the memory and disk tiers behind one readers/writer lock:
//! write-through puts, disk-hit promotion, TTL and schema checks on access,
//! and cascading eviction (a key evicted from disk never stays in memory).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::eviction::{self, Victim};
use crate::memory::MemoryTier;
use crate::record::Cacheable;
use crate::stats::{CacheStats, Counters};
use crate::store::DiskStore;
use crate::ttl;

/// Maximum key length in Unicode code points.
const MAX_KEY_LEN: usize = 256;

/// Everything the lock guards: both tiers and the counters.
struct Inner<R> {
    /// `None` once the cache has been closed.
    store: Option<DiskStore>,
    memory: MemoryTier<R>,
    counters: Counters,
}

/// Thread-safe two-tier LRU cache bound to one record type.
///
/// The disk tier (SQLite) is the source of truth; the memory tier holds
/// decoded records for fast hits and is always a subset of disk. Each tier
/// enforces an item-count limit, a byte-size limit, and a TTL; eviction
/// removes the eldest entry by `(timestamp, key)` until the limits hold.
///
/// All operations are synchronous. Reads that mutate state (timestamp
/// refresh, promotion, expiry cleanup) take the writer side of the lock;
/// [`get_count`], [`get_total_size`], and [`get_stats`] take the reader
/// side.
///
/// [`get_count`]: TieredCache::get_count
/// [`get_total_size`]: TieredCache::get_total_size
/// [`get_stats`]: TieredCache::get_stats
pub struct TieredCache<R: Cacheable> {
    inner: RwLock<Inner<R>>,
    config: CacheConfig,
}

impl<R: Cacheable> TieredCache<R> {
    /// Open (or create) a cache whose disk tier lives at `path`.
    ///
    /// Creates the parent directory if missing, enables WAL journaling,
    /// drops any rows written under a different schema version, and trims
    /// the disk tier to the configured limits.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        Self::from_store(DiskStore::open(path.as_ref())?, config)
    }

    /// Open a cache backed by an in-memory SQLite database (for testing).
    pub fn open_in_memory(config: CacheConfig) -> Result<Self> {
        Self::from_store(DiskStore::open_in_memory()?, config)
    }

    fn from_store(mut store: DiskStore, config: CacheConfig) -> Result<Self> {
        if R::schema_version().is_empty() {
            return Err(CacheError::MissingSchemaVersion);
        }

        let removed = store.delete_mismatched(R::schema_version())?;
        if removed > 0 {
            debug!(
                removed,
                expected = R::schema_version(),
                "Dropped entries with a stale schema version"
            );
        }

        // A pre-existing database may exceed the configured limits. These
        // removals predate the ledger; counters start at zero.
        let victims =
            eviction::evict_to_limits(&mut store, config.max_disk_items, config.max_disk_size_bytes)?;
        if !victims.is_empty() {
            debug!(
                evicted = victims.len(),
                "Trimmed oversized store during initialization"
            );
        }

        Ok(Self {
            inner: RwLock::new(Inner {
                store: Some(store),
                memory: MemoryTier::new(),
                counters: Counters::default(),
            }),
            config,
        })
    }

    // ── Single-key operations ───────────────────────────────────────

    /// Store `value` under `key`, stamping it with the current wall clock.
    pub fn put(&self, key: &str, value: R) -> Result<()> {
        self.put_at(key, value, ttl::wall_clock())
    }

    /// Store `value` under `key` with an explicit timestamp.
    ///
    /// Writes through to disk first, then inserts the decoded value into
    /// memory when it fits `max_item_size_bytes`, then applies eviction to
    /// both tiers.
    pub fn put_at(&self, key: &str, value: R, timestamp: f64) -> Result<()> {
        validate_key(key)?;
        let encoded = value.encode()?;
        let size = encoded.len() as u64;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        store.write(key, &encoded, timestamp, R::schema_version(), size)?;
        let disk_victims =
            self.apply_disk_eviction(store, &mut inner.memory, &mut inner.counters)?;

        // If the write itself was evicted (it alone can exceed the disk
        // budget), memory must not keep it either.
        let survived = !disk_victims.iter().any(|v| v.key == key);
        if survived && size <= self.config.max_item_size_bytes {
            inner
                .memory
                .insert(key.to_string(), Arc::new(value), timestamp, size);
            self.apply_memory_eviction(&mut inner.memory, &mut inner.counters)?;
        } else {
            inner.memory.remove(key);
        }

        inner.counters.total_puts += 1;
        Ok(())
    }

    /// Fetch the record for `key`, using the current wall clock for TTL
    /// checks and timestamp refresh.
    pub fn get(&self, key: &str) -> Result<Option<Arc<R>>> {
        self.get_at(key, ttl::wall_clock())
    }

    /// Fetch the record for `key` at an explicit timestamp.
    ///
    /// A memory hit refreshes both tiers' timestamps. A disk hit decodes,
    /// refreshes the row, and promotes the record into memory when it fits.
    /// Expired, schema-mismatched, and undecodable entries are removed on
    /// discovery and count as misses.
    pub fn get_at(&self, key: &str, timestamp: f64) -> Result<Option<Arc<R>>> {
        validate_key(key)?;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;
        self.lookup(store, &mut inner.memory, &mut inner.counters, key, timestamp)
    }

    /// Whether a live entry exists for `key` (wall-clock TTL evaluation).
    pub fn exists(&self, key: &str) -> Result<bool> {
        self.exists_at(key, ttl::wall_clock())
    }

    /// Whether a live entry exists for `key` at an explicit timestamp.
    ///
    /// Applies the same TTL and schema checks as [`get_at`], removing
    /// entries that fail them, but never refreshes timestamps, never
    /// promotes, and moves no hit/miss counters.
    ///
    /// [`get_at`]: TieredCache::get_at
    pub fn exists_at(&self, key: &str, timestamp: f64) -> Result<bool> {
        validate_key(key)?;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        if let Some(entry) = inner.memory.get(key) {
            if !ttl::expired(timestamp, entry.timestamp, self.config.memory_ttl_seconds) {
                return Ok(true);
            }
            trace!(key, "Memory entry expired");
            inner.memory.remove(key);
        }

        let Some(entry) = store.get(key)? else {
            return Ok(false);
        };

        if entry.schema_version != R::schema_version() {
            trace!(
                key,
                stored = %entry.schema_version,
                expected = R::schema_version(),
                "Schema version mismatch, discarding entry"
            );
            store.delete(key)?;
            inner.memory.remove(key);
            return Ok(false);
        }

        if ttl::expired(timestamp, entry.timestamp, self.config.disk_ttl_seconds) {
            trace!(key, "Disk entry expired");
            store.delete(key)?;
            inner.memory.remove(key);
            return Ok(false);
        }

        Ok(true)
    }

    /// Remove `key` from both tiers. Removing an absent key is a no-op that
    /// still counts as one delete.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        inner.memory.remove(key);
        store.delete(key)?;
        inner.counters.total_deletes += 1;
        Ok(())
    }

    // ── Batch operations ────────────────────────────────────────────

    /// Store a batch of records, stamping them with the current wall clock.
    pub fn put_many(&self, items: Vec<(String, R)>) -> Result<()> {
        self.put_many_at(items, ttl::wall_clock())
    }

    /// Store a batch of records with one shared timestamp.
    ///
    /// Every key is validated and every value encoded before anything is
    /// written. The disk writes happen in a single transaction; on failure
    /// the batch rolls back and memory is untouched. Eviction runs once per
    /// tier after all inserts.
    pub fn put_many_at(&self, items: Vec<(String, R)>, timestamp: f64) -> Result<()> {
        let mut prepared = Vec::with_capacity(items.len());
        for (key, value) in items {
            validate_key(&key)?;
            let encoded = value.encode()?;
            let size = encoded.len() as u64;
            prepared.push((key, value, encoded, size));
        }
        let count = prepared.len() as u64;

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        let rows: Vec<(&str, &str, u64)> = prepared
            .iter()
            .map(|(key, _, encoded, size)| (key.as_str(), encoded.as_str(), *size))
            .collect();
        store.write_many(&rows, timestamp, R::schema_version())?;

        for (key, value, _, size) in prepared {
            if size <= self.config.max_item_size_bytes {
                inner.memory.insert(key, Arc::new(value), timestamp, size);
            } else {
                inner.memory.remove(&key);
            }
        }

        self.apply_disk_eviction(store, &mut inner.memory, &mut inner.counters)?;
        self.apply_memory_eviction(&mut inner.memory, &mut inner.counters)?;

        inner.counters.total_puts += count;
        Ok(())
    }

    /// Fetch a batch of records, returning only the keys that were found.
    pub fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Arc<R>>> {
        self.get_many_at(keys, ttl::wall_clock())
    }

    /// Fetch a batch of records at an explicit timestamp.
    ///
    /// Each key runs the full [`get_at`] protocol — per-key hit/miss
    /// accounting, timestamp refresh, promotion — under one lock
    /// acquisition. Missing and invalidated keys are omitted from the
    /// result.
    ///
    /// [`get_at`]: TieredCache::get_at
    pub fn get_many_at(&self, keys: &[String], timestamp: f64) -> Result<HashMap<String, Arc<R>>> {
        for key in keys {
            validate_key(key)?;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        let mut found = HashMap::new();
        for key in keys {
            if let Some(record) =
                self.lookup(store, &mut inner.memory, &mut inner.counters, key, timestamp)?
            {
                found.insert(key.clone(), record);
            }
        }
        Ok(found)
    }

    /// Remove a batch of keys from both tiers in one disk transaction.
    /// Unknown keys are skipped but still counted as deletes.
    pub fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            validate_key(key)?;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        store.delete_many(keys)?;
        for key in keys {
            inner.memory.remove(key);
        }
        inner.counters.total_deletes += keys.len() as u64;
        Ok(())
    }

    // ── Whole-cache operations ──────────────────────────────────────

    /// Drop every entry from both tiers. Monotonic counters are preserved;
    /// the gauges go to zero.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let store = inner.store.as_mut().ok_or(CacheError::Closed)?;

        store.delete_all()?;
        inner.memory.clear();
        debug!("Cache cleared");
        Ok(())
    }

    /// Release the disk store and drop all memory state.
    ///
    /// Every subsequent call on this cache fails with [`CacheError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let store = guard.store.take().ok_or(CacheError::Closed)?;
        store.close()?;
        guard.memory.clear();
        info!("Cache closed");
        Ok(())
    }

    // ── Read-only accessors ─────────────────────────────────────────

    /// Number of entries in the cache, defined as the disk tier's row count
    /// (disk is a superset of memory).
    pub fn get_count(&self) -> Result<u64> {
        let guard = self.inner.read();
        let store = guard.store.as_ref().ok_or(CacheError::Closed)?;
        store.count()
    }

    /// Total encoded size of the cache in bytes, defined as the disk tier's
    /// total.
    pub fn get_total_size(&self) -> Result<u64> {
        let guard = self.inner.read();
        let store = guard.store.as_ref().ok_or(CacheError::Closed)?;
        store.total_size()
    }

    /// Consistent snapshot of counters and gauges.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let guard = self.inner.read();
        let store = guard.store.as_ref().ok_or(CacheError::Closed)?;
        Ok(guard
            .counters
            .snapshot(guard.memory.len() as u64, store.count()?))
    }

    /// The configured limits.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ── Internals ───────────────────────────────────────────────────

    /// The shared `get` protocol: memory first, then disk with schema, TTL,
    /// and decode checks, refreshing timestamps and promoting on a disk hit.
    fn lookup(
        &self,
        store: &mut DiskStore,
        memory: &mut MemoryTier<R>,
        counters: &mut Counters,
        key: &str,
        now: f64,
    ) -> Result<Option<Arc<R>>> {
        if let Some(entry) = memory.get(key) {
            if !ttl::expired(now, entry.timestamp, self.config.memory_ttl_seconds) {
                let record = Arc::clone(&entry.record);
                memory.touch(key, now);
                store.touch(key, now)?;
                counters.memory_hits += 1;
                counters.total_gets += 1;
                return Ok(Some(record));
            }
            // Expired in memory only; the disk row may still be live.
            trace!(key, "Memory entry expired");
            memory.remove(key);
        }

        let Some(entry) = store.get(key)? else {
            counters.misses += 1;
            counters.total_gets += 1;
            return Ok(None);
        };

        if entry.schema_version != R::schema_version() {
            trace!(
                key,
                stored = %entry.schema_version,
                expected = R::schema_version(),
                "Schema version mismatch, discarding entry"
            );
            store.delete(key)?;
            memory.remove(key);
            counters.misses += 1;
            counters.total_gets += 1;
            return Ok(None);
        }

        if ttl::expired(now, entry.timestamp, self.config.disk_ttl_seconds) {
            trace!(key, "Disk entry expired");
            store.delete(key)?;
            memory.remove(key);
            counters.misses += 1;
            counters.total_gets += 1;
            return Ok(None);
        }

        let record = match R::decode(&entry.value) {
            Ok(record) => Arc::new(record),
            Err(e) => {
                trace!(key, error = %e, "Stored entry failed to decode, discarding");
                store.delete(key)?;
                memory.remove(key);
                counters.misses += 1;
                counters.total_gets += 1;
                return Ok(None);
            }
        };

        store.touch(key, now)?;
        if entry.size <= self.config.max_item_size_bytes {
            memory.insert(key.to_string(), Arc::clone(&record), now, entry.size);
            self.apply_memory_eviction(memory, counters)?;
        }
        counters.disk_hits += 1;
        counters.total_gets += 1;
        Ok(Some(record))
    }

    /// Trim the disk tier to its limits, cascading every victim into the
    /// memory tier and recording both removals in the ledger.
    fn apply_disk_eviction(
        &self,
        store: &mut DiskStore,
        memory: &mut MemoryTier<R>,
        counters: &mut Counters,
    ) -> Result<Vec<Victim>> {
        let victims = eviction::evict_to_limits(
            store,
            self.config.max_disk_items,
            self.config.max_disk_size_bytes,
        )?;
        for victim in &victims {
            counters.disk_evictions += 1;
            trace!(key = %victim.key, size = victim.size, "Evicted entry from disk");
            if memory.remove(&victim.key) {
                counters.memory_evictions += 1;
                trace!(key = %victim.key, "Cascading eviction removed entry from memory");
            }
        }
        Ok(victims)
    }

    /// Trim the memory tier to its limits.
    fn apply_memory_eviction(
        &self,
        memory: &mut MemoryTier<R>,
        counters: &mut Counters,
    ) -> Result<()> {
        let victims = eviction::evict_to_limits(
            memory,
            self.config.max_memory_items,
            self.config.max_memory_size_bytes,
        )?;
        for victim in &victims {
            counters.memory_evictions += 1;
            trace!(key = %victim.key, size = victim.size, "Evicted entry from memory");
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key is empty".to_string()));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds {MAX_KEY_LEN} code points"
        )));
    }
    Ok(())
}
