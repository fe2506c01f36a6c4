mod memory;
mod pattern;
#[cfg(feature = "redis")]
mod redis_backend;

pub use memory::MemoryCacheBackend;
pub use pattern::glob_match;
#[cfg(feature = "redis")]
pub use redis_backend::RedisCacheBackend;
