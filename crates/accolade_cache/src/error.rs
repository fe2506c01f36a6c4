//! Cache error types.

/// Errors reported by cache backends.
///
/// [`crate::CacheStore`] logs and absorbs every one of these; they only
/// surface when a backend is used directly.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend cannot be reached
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
    /// The backend was reached but the command failed
    #[error("Cache backend error: {0}")]
    Backend(String),
    /// A value could not be encoded for storage
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
