//! Cache storage trait and its backends.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Trait for cache storage backends.
///
/// Values are stored as JSON so one store can hold every result type.
/// Entries are replaced wholesale on `set`, never updated in place.
pub trait CacheStorage: Send + Sync {
  /// Get a live value. Expired entries read as absent.
  fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Upsert a value that expires `ttl` from now. Last writer wins.
  fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

  /// Remove a key. Removing an absent key is a no-op.
  fn delete(&self, key: &str) -> Result<()>;

  /// All stored keys, possibly including expired ones.
  fn keys(&self) -> Result<Vec<String>>;

  /// Remove every entry.
  fn clear(&self) -> Result<()>;
}

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct CacheEntry {
  value: Value,
  expires_at: Instant,
}

/// In-process storage. Expired entries are evicted lazily on access.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<Value>> {
    let mut entries = self.lock()?;

    match entries.get(key) {
      Some(entry) if Instant::now() < entry.expires_at => Ok(Some(entry.value.clone())),
      Some(_) => {
        entries.remove(key);
        Ok(None)
      }
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
    let now = Instant::now();
    let expires_at = now
      .checked_add(ttl)
      .or_else(|| now.checked_add(FAR_FUTURE))
      .unwrap_or(now);
    let entry = CacheEntry { value, expires_at };
    self.lock()?.insert(key.to_string(), entry);
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    self.lock()?.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn clear(&self) -> Result<()> {
    self.lock()?.clear();
    Ok(())
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<Value>> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based storage, so unexpired entries survive a restart.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the cache table. `expires_at` is unix time in milliseconds.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires
    ON cache_entries(expires_at);
"#;

impl SqliteStorage {
  /// Open (or create) the cache database at `path`, or the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    storage.purge_expired()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("jira-mcp").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))
  }

  /// Drop every entry whose TTL has elapsed. Returns the number removed.
  pub fn purge_expired(&self) -> Result<usize> {
    self
      .lock()?
      .execute(
        "DELETE FROM cache_entries WHERE expires_at <= ?",
        params![now_millis()],
      )
      .map_err(|e| eyre!("Failed to purge expired cache entries: {}", e))
  }
}

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<Value>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT value, expires_at FROM cache_entries WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((data, expires_at)) if now_millis() < expires_at => {
        let value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cache entry: {}", e))?;
        Ok(Some(value))
      }
      Some(_) => {
        conn
          .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
          .map_err(|e| eyre!("Failed to evict cache entry: {}", e))?;
        Ok(None)
      }
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
    let data = serde_json::to_vec(&value).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;
    let expires_at = now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));

    self
      .lock()?
      .execute(
        "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)",
        params![key, data, expires_at],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    self
      .lock()?
      .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry: {}", e))?;
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT key FROM cache_entries")
      .map_err(|e| eyre!("Failed to prepare key scan: {}", e))?;

    let keys = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to scan cache keys: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache key: {}", e))?;

    Ok(keys)
  }

  fn clear(&self) -> Result<()> {
    self
      .lock()?
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache entries: {}", e))?;
    Ok(())
  }
}

fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}
