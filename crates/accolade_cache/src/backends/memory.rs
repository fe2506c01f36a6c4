//! In-process cache backend.

use super::pattern::glob_match;
use crate::backend::{CacheBackend, ScanPage};
use crate::error::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cached blob with its expiry.
#[derive(Debug, Clone)]
struct CachedEntry {
    value: String,
    cached_at: Instant,
    ttl: Duration,
    /// Write sequence number; scan cursors are expressed in these
    seq: u64,
}

impl CachedEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.cached_at) < self.ttl
    }
}

/// Cache backend kept in a concurrent map.
///
/// Expired entries are dropped lazily on read and during scans. Scan cursors
/// are write sequence numbers rather than positions, so deleting keys between
/// pages never makes a scan skip a key.
#[derive(Debug)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, CachedEntry>,
    next_seq: AtomicU64,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_fresh(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| entry.value().is_fresh(now))
            .unwrap_or(false)
    }

    fn purge_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let lookup = self
            .entries
            .get(key)
            .map(|entry| (entry.value().is_fresh(now), entry.value().value.clone()));

        match lookup {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.purge_expired(key, now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                cached_at: Instant::now(),
                ttl,
                seq,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage, CacheError> {
        let now = Instant::now();
        let mut window: Vec<(u64, String, bool)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().seq >= cursor)
            .map(|entry| {
                let cached = entry.value();
                (cached.seq, entry.key().clone(), cached.is_fresh(now))
            })
            .collect();
        window.sort_unstable_by_key(|(seq, _, _)| *seq);

        let count = count.max(1);
        let exhausted = window.len() <= count;
        window.truncate(count);

        let next_cursor = match window.last() {
            Some((seq, _, _)) if !exhausted => seq + 1,
            _ => 0,
        };

        let mut keys = Vec::new();
        for (_, key, fresh) in window {
            if !fresh {
                self.purge_expired(&key, now);
            } else if glob_match(pattern, &key) {
                keys.push(key);
            }
        }

        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
