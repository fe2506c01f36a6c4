//! Redis cache backend.

use crate::backend::{CacheBackend, ScanPage};
use crate::error::CacheError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError};
use std::time::Duration;
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Cache backend talking to Redis through a [`ConnectionManager`], which
/// reconnects on its own after the server comes back.
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("connection", &"[connection manager]")
            .finish()
    }
}

impl RedisCacheBackend {
    /// Connects to `redis_url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// Fails fast when the server is unreachable so startup can fall back to
    /// running without a cache.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECT_TIMEOUT);

        let client = Client::open(redis_url).map_err(map_redis_error)?;
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(map_redis_error)?;

        info!("🔌 Connected to Redis cache at {}", redis_url);
        Ok(Self { connection })
    }
}

fn map_redis_error(e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Unavailable(e.to_string())
    } else {
        CacheError::Backend(e.to_string())
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = connection
            .set_ex(key, value, seconds)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection.clone();
        let _: () = connection.del(keys).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage, CacheError> {
        let mut connection = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut connection)
            .await
            .map_err(map_redis_error)?;

        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    fn backend_name(&self) -> &str {
        "redis"
    }
}
