//! Cache-aside store built on top of a [`CacheBackend`].

use crate::backend::CacheBackend;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Keys examined per `SCAN` page during pattern invalidation.
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Point-in-time counters for a [`CacheStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Backend failures absorbed by the store
    pub errors: u64,
    /// Keys removed through `invalidate` and `invalidate_pattern`
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    invalidations: AtomicU64,
}

/// Cache-aside store that never fails its callers.
///
/// Reads that cannot be served (no backend, backend error, undecodable blob)
/// are misses; writes that cannot be made are dropped. Only the caller's own
/// fetcher can make [`CacheStore::cached`] fail.
///
/// A value fetched while its key is invalidated is returned to the caller
/// but not written back.
pub struct CacheStore {
    backend: Option<Arc<dyn CacheBackend>>,
    scan_batch: usize,
    counters: Counters,
    /// Invalidation count per key
    generations: DashMap<String, u64>,
    /// Bumped by every pattern invalidation
    pattern_generation: AtomicU64,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field(
                "backend",
                &self.backend.as_ref().map(|backend| backend.backend_name().to_string()),
            )
            .field("scan_batch", &self.scan_batch)
            .finish()
    }
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            scan_batch: DEFAULT_SCAN_BATCH,
            counters: Counters::default(),
            generations: DashMap::new(),
            pattern_generation: AtomicU64::new(0),
        }
    }

    /// A store with no backend: every read misses, every write is a no-op.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            scan_batch: DEFAULT_SCAN_BATCH,
            counters: Counters::default(),
            generations: DashMap::new(),
            pattern_generation: AtomicU64::new(0),
        }
    }

    pub fn with_scan_batch(mut self, scan_batch: usize) -> Self {
        self.scan_batch = scan_batch.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Name of the configured backend, or `"disabled"`.
    pub fn backend_name(&self) -> &str {
        self.backend
            .as_ref()
            .map(|backend| backend.backend_name())
            .unwrap_or("disabled")
    }

    /// Reads and decodes `key`. Any failure is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let raw = match backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("💨 Cache miss: {}", key);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                warn!("⚠️ Cache read failed for {}, treating as miss: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("🎯 Cache hit: {}", key);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!("⚠️ Undecodable cache entry {}, treating as miss: {}", key, e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Encodes and stores `value` under `key`. Failures are logged and dropped.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = &self.backend else {
            return;
        };

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("⚠️ Could not encode cache entry {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if let Err(e) = backend.set_with_ttl(key, encoded, ttl).await {
            warn!("⚠️ Cache write failed for {}: {}", key, e);
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        // Bumped before the delete so an in-flight `cached` cannot restore the key
        *self.generations.entry(key.to_string()).or_insert(0) += 1;

        match backend.delete(key).await {
            Ok(()) => {
                debug!("🧹 Invalidated cache key {}", key);
                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("⚠️ Cache invalidation failed for {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Deletes every key matching the glob `pattern`, one scan page at a time.
    ///
    /// Returns the number of distinct keys deleted. `SCAN` may report a key on
    /// more than one page; it is counted once. A backend failure stops the
    /// walk early; whatever was deleted so far stays deleted.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let Some(backend) = &self.backend else {
            return 0;
        };

        self.pattern_generation.fetch_add(1, Ordering::SeqCst);

        let mut cursor = 0;
        let mut seen = HashSet::new();
        loop {
            let page = match backend.scan(pattern, cursor, self.scan_batch).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("⚠️ Cache scan for {} failed after {} deletions: {}", pattern, seen.len(), e);
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            };

            if !page.keys.is_empty() {
                if let Err(e) = backend.delete_many(&page.keys).await {
                    warn!("⚠️ Cache bulk delete for {} failed: {}", pattern, e);
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                seen.extend(page.keys);
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        let deleted = seen.len();
        self.counters
            .invalidations
            .fetch_add(deleted as u64, Ordering::Relaxed);
        debug!("🧹 Invalidated {} keys matching {}", deleted, pattern);
        deleted
    }

    /// Returns the cached value for `key`, or runs `fetcher`, caches its
    /// result for `ttl` and returns it.
    ///
    /// The fetcher's error is the only error this method returns. If `key` is
    /// invalidated while the fetcher runs, the result is not cached.
    pub async fn cached<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let generation = self.generation(key);
        let value = fetcher().await?;

        if self.generation(key) == generation {
            self.set(key, &value, ttl).await;
        } else {
            debug!("🧹 {} invalidated during fetch, not caching", key);
        }
        Ok(value)
    }

    fn generation(&self, key: &str) -> (u64, u64) {
        let per_key = self.generations.get(key).map(|generation| *generation).unwrap_or(0);
        (per_key, self.pattern_generation.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }
}
