//! Cache layer that orchestrates caching logic with remote fetching.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::storage::CacheStorage;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Cache layer that sits between domain operations and the remote API.
///
/// Cheap to clone; every clone shares the same storage and in-flight table.
/// Storage failures never fail a request: a failed read is a miss and a
/// failed write is dropped, both with a warning.
#[derive(Clone)]
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// Per-key gates for in-flight producers. `None` disables de-duplication.
  in_flight: Option<Arc<Mutex<HashMap<String, Gate>>>>,
}

impl CacheLayer {
  /// Create a cache layer over `storage` with single-flight enabled.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      storage: Arc::new(storage),
      in_flight: Some(Arc::default()),
    }
  }

  /// Toggle per-key de-duplication of concurrent producers.
  pub fn with_single_flight(mut self, enabled: bool) -> Self {
    self.in_flight = enabled.then(Arc::default);
    self
  }

  pub fn storage(&self) -> &dyn CacheStorage {
    self.storage.as_ref()
  }

  /// Return the cached value for `key`, or run `producer`, cache its output
  /// for `ttl` and return it.
  ///
  /// Producer errors propagate and are never cached. With single-flight on,
  /// concurrent callers for one key wait for the first producer and then
  /// re-check the cache instead of calling the remote service again.
  pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(hit) = self.lookup(key) {
      return Ok(hit);
    }

    let Some(in_flight) = &self.in_flight else {
      return self.populate(key, ttl, producer).await;
    };

    let guard = {
      let mut gates = in_flight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      GateGuard {
        in_flight: in_flight.as_ref(),
        key,
        gate: Arc::clone(gates.entry(key.to_string()).or_default()),
      }
    };

    let _permit = guard.gate.lock().await;
    match self.lookup(key) {
      Some(hit) => Ok(hit),
      None => self.populate(key, ttl, producer).await,
    }
  }

  /// Read a live value without populating.
  #[cfg(test)]
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self.lookup(key)
  }

  #[cfg(test)]
  pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
    self.store(key, value, ttl);
  }

  pub fn delete(&self, key: &str) {
    if let Err(e) = self.storage.delete(key) {
      warn!(key, error = %e, "Failed to delete cache entry");
    }
  }

  fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    match self.storage.get(key) {
      Ok(Some(value)) => match serde_json::from_value(value) {
        Ok(hit) => {
          debug!(key, "cache hit");
          Some(hit)
        }
        Err(e) => {
          warn!(key, error = %e, "Cached value has unexpected shape, treating as miss");
          None
        }
      },
      Ok(None) => None,
      Err(e) => {
        warn!(key, error = %e, "Cache read failed, treating as miss");
        None
      }
    }
  }

  async fn populate<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
  where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    debug!(key, "cache miss");
    let value = producer().await?;
    self.store(key, &value, ttl);
    Ok(value)
  }

  fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
    let stored = serde_json::to_value(value)
      .map_err(|e| eyre!("Failed to serialize cache value: {}", e))
      .and_then(|json| self.storage.set(key, json, ttl));

    if let Err(e) = stored {
      warn!(key, error = %e, "Cache write failed");
    }
  }
}

/// A caller's share of a per-key gate. Released on drop, so a caller that
/// is cancelled mid-wait or mid-fetch does not leave its entry behind.
struct GateGuard<'a> {
  in_flight: &'a Mutex<HashMap<String, Gate>>,
  key: &'a str,
  gate: Gate,
}

impl Drop for GateGuard<'_> {
  fn drop(&mut self) {
    let Ok(mut gates) = self.in_flight.lock() else {
      return;
    };
    // One reference in the map, one held by this guard.
    if Arc::strong_count(&self.gate) <= 2 {
      gates.remove(self.key);
    }
  }
}
