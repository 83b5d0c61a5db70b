//! Two-tier LRU cache for typed, versioned records.
//!
//! `strata` keeps decoded records in a fast in-memory tier and their
//! canonical JSON encodings in a durable SQLite tier. Disk is the source of
//! truth: every memory entry also exists on disk, and evicting a key from
//! disk removes it from memory too. Both tiers enforce an item-count limit,
//! a byte-size limit, and a time-to-live; eviction is deterministic,
//! removing the eldest entry by `(timestamp, key)` until the limits hold.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TieredCache<R>          one readers/writer lock             │
//! │  ┌──────────────────┐      ┌───────────────────────────────┐ │
//! │  │ MemoryTier       │      │ DiskStore (SQLite, WAL)       │ │
//! │  │ decoded Arc<R>   │ ⊆    │ key → (json, ts, schema, size)│ │
//! │  └──────────────────┘      └───────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records implement [`Cacheable`]: a schema-version tag plus canonical JSON
//! encode/decode. Entries written under a different schema version are
//! discarded when next accessed; expiry is likewise checked only on access.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use strata::{Cacheable, CacheConfig, TieredCache};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Summary {
//!     text: String,
//! }
//!
//! impl Cacheable for Summary {
//!     fn schema_version() -> &'static str {
//!         "1.0.0"
//!     }
//! }
//!
//! let cache = TieredCache::open_in_memory(CacheConfig::default())?;
//! cache.put(
//!     "report:42",
//!     Summary {
//!         text: "done".to_string(),
//!     },
//! )?;
//!
//! let hit = cache.get("report:42")?.expect("just stored");
//! assert_eq!(hit.text, "done");
//! # Ok::<(), strata::CacheError>(())
//! ```

mod cache;
mod config;
mod error;
mod eviction;
mod memory;
mod record;
mod stats;
mod store;
mod ttl;

pub use cache::TieredCache;
pub use config::{
    CacheConfig, DEFAULT_DISK_TTL_SECONDS, DEFAULT_MAX_DISK_ITEMS, DEFAULT_MAX_DISK_SIZE_BYTES,
    DEFAULT_MAX_ITEM_SIZE_BYTES, DEFAULT_MAX_MEMORY_ITEMS, DEFAULT_MAX_MEMORY_SIZE_BYTES,
    DEFAULT_MEMORY_TTL_SECONDS,
};
pub use error::{CacheError, Result};
pub use record::Cacheable;
pub use stats::CacheStats;
