//! Configuration for the two-tier cache.

/// Default maximum number of decoded records held in memory.
pub const DEFAULT_MAX_MEMORY_ITEMS: usize = 1_000;

/// Default memory-tier byte budget (64 MiB).
pub const DEFAULT_MAX_MEMORY_SIZE_BYTES: u64 = 64 * 1024 * 1024;

/// Default maximum number of rows kept on disk.
pub const DEFAULT_MAX_DISK_ITEMS: usize = 100_000;

/// Default disk-tier byte budget (1 GiB).
pub const DEFAULT_MAX_DISK_SIZE_BYTES: u64 = 1024 * 1024 * 1024;

/// Default memory TTL (one hour).
pub const DEFAULT_MEMORY_TTL_SECONDS: f64 = 3_600.0;

/// Default disk TTL (one week).
pub const DEFAULT_DISK_TTL_SECONDS: f64 = 7.0 * 86_400.0;

/// Default cap on a single encoded record (1 MiB). Larger records are kept
/// on disk only and never promoted into memory.
pub const DEFAULT_MAX_ITEM_SIZE_BYTES: u64 = 1024 * 1024;

/// Immutable limits for both tiers, fixed at construction.
///
/// Each tier is bounded by an item count and a byte total; entries older
/// than the tier's TTL are dropped when they are next accessed.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the memory tier.
    pub max_memory_items: usize,

    /// Maximum total encoded size of the memory tier, in bytes.
    pub max_memory_size_bytes: u64,

    /// Maximum number of rows in the disk tier.
    pub max_disk_items: usize,

    /// Maximum total encoded size of the disk tier, in bytes.
    pub max_disk_size_bytes: u64,

    /// Time-to-live for memory entries, in seconds.
    pub memory_ttl_seconds: f64,

    /// Time-to-live for disk entries, in seconds.
    pub disk_ttl_seconds: f64,

    /// Records whose encoding exceeds this size stay disk-only.
    pub max_item_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_items: DEFAULT_MAX_MEMORY_ITEMS,
            max_memory_size_bytes: DEFAULT_MAX_MEMORY_SIZE_BYTES,
            max_disk_items: DEFAULT_MAX_DISK_ITEMS,
            max_disk_size_bytes: DEFAULT_MAX_DISK_SIZE_BYTES,
            memory_ttl_seconds: DEFAULT_MEMORY_TTL_SECONDS,
            disk_ttl_seconds: DEFAULT_DISK_TTL_SECONDS,
            max_item_size_bytes: DEFAULT_MAX_ITEM_SIZE_BYTES,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries in the memory tier.
    pub fn with_max_memory_items(mut self, max: usize) -> Self {
        self.max_memory_items = max;
        self
    }

    /// Set the memory-tier byte budget.
    pub fn with_max_memory_size_bytes(mut self, max: u64) -> Self {
        self.max_memory_size_bytes = max;
        self
    }

    /// Set the maximum number of rows in the disk tier.
    pub fn with_max_disk_items(mut self, max: usize) -> Self {
        self.max_disk_items = max;
        self
    }

    /// Set the disk-tier byte budget.
    pub fn with_max_disk_size_bytes(mut self, max: u64) -> Self {
        self.max_disk_size_bytes = max;
        self
    }

    /// Set the memory-tier TTL in seconds.
    pub fn with_memory_ttl_seconds(mut self, ttl: f64) -> Self {
        self.memory_ttl_seconds = ttl;
        self
    }

    /// Set the disk-tier TTL in seconds.
    pub fn with_disk_ttl_seconds(mut self, ttl: f64) -> Self {
        self.disk_ttl_seconds = ttl;
        self
    }

    /// Set the per-record size cap for memory residency.
    pub fn with_max_item_size_bytes(mut self, max: u64) -> Self {
        self.max_item_size_bytes = max;
        self
    }
}
