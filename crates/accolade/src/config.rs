//! Configuration management for the accolade service.
//!
//! This module handles loading and validation of the service configuration
//! from a TOML file. Command-line overrides are applied by the caller.

use achievement_engine::CacheTtls;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// Every section may be omitted; missing sections and fields take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache-aside layer settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Unlock ledger settings
    #[serde(default)]
    pub ledger: LedgerSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Which cache backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(format!("Unknown cache backend: {}", other)),
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendKind::Memory => f.write_str("memory"),
            CacheBackendKind::Redis => f.write_str("redis"),
        }
    }
}

/// Which store holds the unlock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackendKind {
    Memory,
    Mongodb,
}

impl fmt::Display for LedgerBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerBackendKind::Memory => f.write_str("memory"),
            LedgerBackendKind::Mongodb => f.write_str("mongodb"),
        }
    }
}

/// Cache-aside layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether to cache at all; when false every query reads the ledger
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendKind,
    /// Redis connection URL, used when `backend = "redis"`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// TTL of the static catalog in seconds
    #[serde(default = "default_catalog_ttl")]
    pub catalog_ttl_secs: u64,
    /// TTL of per-user achievement lists in seconds
    #[serde(default = "default_user_ttl")]
    pub user_ttl_secs: u64,
    /// Keys examined per page during pattern invalidation
    #[serde(default = "default_scan_batch")]
    pub scan_batch: usize,
}

/// Unlock ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackendKind,
    /// MongoDB connection string, used when `backend = "mongodb"`
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_true() -> bool {
    true
}

fn default_cache_backend() -> CacheBackendKind {
    CacheBackendKind::Memory
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_catalog_ttl() -> u64 {
    86_400
}

fn default_user_ttl() -> u64 {
    300
}

fn default_scan_batch() -> usize {
    accolade_cache::DEFAULT_SCAN_BATCH
}

fn default_ledger_backend() -> LedgerBackendKind {
    LedgerBackendKind::Memory
}

fn default_mongodb_uri() -> String {
    "mongodb://127.0.0.1:27017".to_string()
}

fn default_database() -> String {
    "accolade".to_string()
}

fn default_collection() -> String {
    "achievement_unlocks".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            catalog_ttl_secs: default_catalog_ttl(),
            user_ttl_secs: default_user_ttl(),
            scan_batch: default_scan_batch(),
        }
    }
}

impl CacheSettings {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            catalog: Duration::from_secs(self.catalog_ttl_secs),
            user: Duration::from_secs(self.user_ttl_secs),
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            mongodb_uri: default_mongodb_uri(),
            database: default_database(),
            collection: default_collection(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Checks the configuration for values the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.enabled {
            if self.cache.catalog_ttl_secs == 0 || self.cache.user_ttl_secs == 0 {
                return Err("Cache TTLs must be greater than zero".to_string());
            }
            if self.cache.scan_batch == 0 {
                return Err("Cache scan_batch must be greater than zero".to_string());
            }
            if self.cache.backend == CacheBackendKind::Redis
                && !(self.cache.redis_url.starts_with("redis://")
                    || self.cache.redis_url.starts_with("rediss://"))
            {
                return Err(format!("Invalid Redis URL: {}", &self.cache.redis_url));
            }
        }

        if self.ledger.backend == LedgerBackendKind::Mongodb {
            if !(self.ledger.mongodb_uri.starts_with("mongodb://")
                || self.ledger.mongodb_uri.starts_with("mongodb+srv://"))
            {
                return Err(format!("Invalid MongoDB URI: {}", &self.ledger.mongodb_uri));
            }
            if self.ledger.database.is_empty() || self.ledger.collection.is_empty() {
                return Err("Ledger database and collection cannot be empty".to_string());
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert!(config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert_eq!(config.cache.catalog_ttl_secs, 86_400);
        assert_eq!(config.cache.user_ttl_secs, 300);
        assert_eq!(config.cache.scan_batch, 100);

        assert_eq!(config.ledger.backend, LedgerBackendKind::Memory);
        assert_eq!(config.ledger.collection, "achievement_unlocks");

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttls_conversion() {
        let mut config = AppConfig::default();
        config.cache.user_ttl_secs = 60;

        let ttls = config.cache.ttls();
        assert_eq!(ttls.catalog, Duration::from_secs(86_400));
        assert_eq!(ttls.user, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accolade.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert!(path.exists());

        let written = fs::read_to_string(&path).await.unwrap();
        let reparsed: AppConfig = toml::from_str(&written).unwrap();
        assert_eq!(reparsed.ledger.database, "accolade");
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[cache]
enabled = true
backend = "redis"
redis_url = "redis://cache.internal:6380"
catalog_ttl_secs = 3600
user_ttl_secs = 120
scan_batch = 500

[ledger]
backend = "mongodb"
mongodb_uri = "mongodb://db.internal:27017"
database = "starter"
collection = "unlocks"

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&temp_file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.redis_url, "redis://cache.internal:6380");
        assert_eq!(config.cache.catalog_ttl_secs, 3600);
        assert_eq!(config.cache.user_ttl_secs, 120);
        assert_eq!(config.cache.scan_batch, 500);

        assert_eq!(config.ledger.backend, LedgerBackendKind::Mongodb);
        assert_eq!(config.ledger.database, "starter");
        assert_eq!(config.ledger.collection, "unlocks");

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_deserialization_with_defaults() {
        let toml_content = r#"
[cache]
backend = "redis"

[logging]
level = "warn"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();

        assert!(config.cache.enabled);
        assert_eq!(config.cache.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.cache.user_ttl_secs, 300);
        assert_eq!(config.ledger.backend, LedgerBackendKind::Memory);
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("[cache]\nbackend = \"memcached\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().contains("Invalid log level"));
    }

    #[test]
    fn test_validation_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.user_ttl_secs = 0;
        assert!(config.validate().unwrap_err().contains("TTLs"));

        // A disabled cache is not checked
        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_backend_urls() {
        let mut config = AppConfig::default();
        config.cache.backend = CacheBackendKind::Redis;
        config.cache.redis_url = "http://127.0.0.1:6379".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid Redis URL"));

        config.cache.redis_url = "rediss://127.0.0.1:6379".to_string();
        assert!(config.validate().is_ok());

        config.ledger.backend = LedgerBackendKind::Mongodb;
        config.ledger.mongodb_uri = "postgres://localhost".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid MongoDB URI"));

        config.ledger.mongodb_uri = "mongodb+srv://cluster.example.net".to_string();
        config.ledger.collection = String::new();
        assert!(config.validate().unwrap_err().contains("cannot be empty"));
    }

    #[test]
    fn test_cache_backend_from_str() {
        assert_eq!("redis".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::Redis);
        assert_eq!("memory".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::Memory);
        assert!("memcached".parse::<CacheBackendKind>().is_err());
        assert_eq!(CacheBackendKind::Redis.to_string(), "redis");
    }
}
