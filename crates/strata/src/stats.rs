//! Operation counters and live gauges.

use serde::{Deserialize, Serialize};

/// Snapshot of cache activity.
///
/// The counters are monotonically non-decreasing over the life of a cache;
/// the `current_*` gauges reflect tier state at snapshot time. Snapshots are
/// taken under the same lock as the operations they describe, so the view is
/// always consistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Gets answered from the memory tier.
    pub memory_hits: u64,

    /// Gets answered from the disk tier (including promotions).
    pub disk_hits: u64,

    /// Gets that found nothing usable (absent, expired, mismatched, or
    /// undecodable).
    pub misses: u64,

    /// Entries removed from memory by the eviction policy, including
    /// cascades from disk eviction.
    pub memory_evictions: u64,

    /// Entries removed from disk by the eviction policy.
    pub disk_evictions: u64,

    /// Records written via `put`/`put_many`.
    pub total_puts: u64,

    /// Lookups via `get`/`get_many`.
    pub total_gets: u64,

    /// Keys submitted to `delete`/`delete_many` (missing keys included).
    pub total_deletes: u64,

    /// Entries currently resident in memory.
    pub current_memory_items: u64,

    /// Rows currently on disk.
    pub current_disk_items: u64,
}

/// Monotonic counters, mutated inside the same critical section as the state
/// change they describe.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub memory_evictions: u64,
    pub disk_evictions: u64,
    pub total_puts: u64,
    pub total_gets: u64,
    pub total_deletes: u64,
}

impl Counters {
    /// Combine the counters with live gauges into a [`CacheStats`] snapshot.
    pub fn snapshot(&self, current_memory_items: u64, current_disk_items: u64) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits,
            disk_hits: self.disk_hits,
            misses: self.misses,
            memory_evictions: self.memory_evictions,
            disk_evictions: self.disk_evictions,
            total_puts: self.total_puts,
            total_gets: self.total_gets,
            total_deletes: self.total_deletes,
            current_memory_items,
            current_disk_items,
        }
    }
}
