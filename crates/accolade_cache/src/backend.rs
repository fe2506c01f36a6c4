//! The key-value contract every cache backend implements.

use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// One page of an incremental key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call; `0` means the scan is complete
    pub cursor: u64,
    /// Keys from this page that match the pattern
    pub keys: Vec<String>,
}

/// String-keyed store of serialized blobs with expiry.
///
/// Patterns follow Redis glob rules: `*`, `?`, `[...]` classes and `\`
/// escapes. [`CacheBackend::scan`] walks the keyspace a page at a time so that
/// bulk invalidation never needs a blocking full enumeration; a key present
/// for the whole scan is returned at least once.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Examines roughly `count` keys starting at `cursor` (use `0` to start).
    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage, CacheError>;

    /// Short name for logs.
    fn backend_name(&self) -> &str;
}
