//! SQLite-backed persistent tier.
//!
//! One `cache` table behind a single shared connection. WAL journaling for
//! file-backed stores, bound parameters throughout, and an index on
//! `(timestamp, key)` so oldest-first scans used by eviction stay cheap.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::info;

use crate::error::{CacheError, Result};
use crate::eviction::{EvictableTier, Victim};

/// A row from the persistent tier.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    /// Canonical encoding of the record.
    pub value: String,

    /// Last-access timestamp, seconds since epoch.
    pub timestamp: f64,

    /// Schema version the record was written under.
    pub schema_version: String,

    /// Byte length of `value`.
    pub size: u64,
}

/// Persistent tier over a single SQLite connection.
///
/// Thread-safe via an internal `Mutex<Connection>`; the coordinator's lock
/// additionally serializes all mutating access.
pub(crate) struct DiskStore {
    conn: Mutex<Connection>,
}

impl DiskStore {
    /// Open (or create) the store at `path`, creating the parent directory
    /// if missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        info!("Cache store opened at {:?}", path);
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                timestamp REAL NOT NULL,
                schema_version TEXT NOT NULL,
                size INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_ts_key ON cache(timestamp, key);
            "#,
        )?;
        Ok(())
    }

    /// Lock the connection for use.
    fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Fetch the row for `key`, if present.
    pub fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        let entry = self
            .conn()
            .query_row(
                "SELECT value, timestamp, schema_version, size FROM cache WHERE key = ?1",
                params![key],
                |row| {
                    Ok(StoredEntry {
                        value: row.get(0)?,
                        timestamp: row.get(1)?,
                        schema_version: row.get(2)?,
                        size: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Upsert one row, replacing any prior entry for `key`.
    pub fn write(
        &self,
        key: &str,
        value: &str,
        timestamp: f64,
        schema_version: &str,
        size: u64,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO cache (key, value, timestamp, schema_version, size)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 timestamp = excluded.timestamp,
                 schema_version = excluded.schema_version,
                 size = excluded.size",
            params![key, value, timestamp, schema_version, size as i64],
        )?;
        Ok(())
    }

    /// Upsert a batch of `(key, value, size)` rows in one transaction.
    ///
    /// All-or-nothing: any failure rolls the whole batch back.
    pub fn write_many(
        &self,
        rows: &[(&str, &str, u64)],
        timestamp: f64,
        schema_version: &str,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cache (key, value, timestamp, schema_version, size)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     timestamp = excluded.timestamp,
                     schema_version = excluded.schema_version,
                     size = excluded.size",
            )?;
            for (key, value, size) in rows {
                stmt.execute(params![key, value, timestamp, schema_version, *size as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Refresh the last-access timestamp for `key`.
    pub fn touch(&self, key: &str, timestamp: f64) -> Result<()> {
        self.conn().execute(
            "UPDATE cache SET timestamp = ?2 WHERE key = ?1",
            params![key, timestamp],
        )?;
        Ok(())
    }

    /// Delete the row for `key`. Returns whether a row existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Delete every named key in one transaction; unknown keys are skipped.
    pub fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM cache WHERE key = ?1")?;
            for key in keys {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row("SELECT 1 FROM cache WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn total_size(&self) -> Result<u64> {
        let total: i64 =
            self.conn()
                .query_row("SELECT COALESCE(SUM(size), 0) FROM cache", [], |row| {
                    row.get(0)
                })?;
        Ok(total as u64)
    }

    /// The `n` eldest rows as `(key, timestamp, size)`, ordered by
    /// `(timestamp asc, key asc)` via the covering index.
    pub fn iter_oldest(&self, n: usize) -> Result<Vec<(String, f64, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, timestamp, size FROM cache
             ORDER BY timestamp ASC, key ASC
             LIMIT ?1",
        )?;
        let iter = stmt.query_map(params![n as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, i64>(2)? as u64,
            ))
        })?;

        let mut rows = Vec::new();
        for row in iter {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Drop every row.
    pub fn delete_all(&self) -> Result<()> {
        self.conn().execute("DELETE FROM cache", [])?;
        Ok(())
    }

    /// Drop every row written under a schema version other than `expected`.
    /// Returns the number of rows removed.
    pub fn delete_mismatched(&self, expected: &str) -> Result<u64> {
        let deleted = self.conn().execute(
            "DELETE FROM cache WHERE schema_version != ?1",
            params![expected],
        )?;
        Ok(deleted as u64)
    }

    /// Close the underlying connection, flushing outstanding WAL state.
    pub fn close(self) -> Result<()> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, e)| CacheError::Database(e))
    }
}

impl EvictableTier for DiskStore {
    fn item_count(&self) -> Result<u64> {
        self.count()
    }

    fn total_bytes(&self) -> Result<u64> {
        self.total_size()
    }

    fn pop_oldest(&mut self) -> Result<Option<Victim>> {
        let eldest = self.iter_oldest(1)?.into_iter().next();
        let Some((key, _, size)) = eldest else {
            return Ok(None);
        };
        self.delete(&key)?;
        Ok(Some(Victim { key, size }))
    }
}
