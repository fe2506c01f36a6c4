//! # Accolade Cache
//!
//! A cache-aside layer for read-heavy queries. Callers ask the [`CacheStore`]
//! for a key; on a miss the store runs the caller's fetcher, stores the result
//! with a TTL and returns it.
//!
//! The cache is an optimization, never a dependency for correctness: when the
//! store is disabled or its backend fails, every read is a miss and every
//! write is a no-op. Callers always get correct results, only slower.
//!
//! ## Backends
//!
//! - [`MemoryCacheBackend`] - in-process map with per-entry expiry
//! - [`RedisCacheBackend`] - Redis through a reconnecting connection manager
//!   (feature `redis`, enabled by default)
//!
//! ## Example
//!
//! ```rust
//! use accolade_cache::{CacheStore, MemoryCacheBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let cache = CacheStore::new(Arc::new(MemoryCacheBackend::new()));
//!
//! let names: Vec<String> = cache
//!     .cached("names", Duration::from_secs(60), || async {
//!         Ok::<_, std::io::Error>(vec!["ada".to_string()])
//!     })
//!     .await?;
//! assert_eq!(names, vec!["ada".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod error;
pub mod store;

pub use backend::{CacheBackend, ScanPage};
pub use backends::MemoryCacheBackend;
#[cfg(feature = "redis")]
pub use backends::RedisCacheBackend;
pub use error::CacheError;
pub use store::{CacheStats, CacheStore, DEFAULT_SCAN_BATCH};
