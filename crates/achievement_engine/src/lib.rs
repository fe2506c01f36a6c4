//! # Achievement Engine
//!
//! Event-driven unlock rules for user achievements.
//!
//! The engine subscribes every [`AchievementDefinition`] in its
//! [`AchievementRegistry`] to the domain events it listens to. When a
//! definition decides a user has earned its achievement, the engine records
//! the unlock in the [`UnlockLedger`] exactly once, announces it with an
//! `AchievementUnlocked` event and invalidates the user's cached list.
//!
//! ## Guarantees
//!
//! - An achievement is unlocked at most once per user, even when events race;
//!   the ledger's uniqueness constraint is the final word.
//! - A failing definition never stops other handlers of the same event.
//! - The cache is optional: with it down, queries go to the ledger.
//!
//! ## Example
//!
//! ```rust
//! use accolade_cache::{CacheStore, MemoryCacheBackend};
//! use accolade_event_system::{create_event_system, AchievementId, BetaEnrolledEvent, UserId};
//! use achievement_engine::{AchievementEngine, AchievementRegistry, CacheTtls, MemoryUnlockLedger};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), achievement_engine::EngineError> {
//! let events = create_event_system();
//! let engine = AchievementEngine::new(
//!     events.clone(),
//!     AchievementRegistry::builtin(),
//!     Arc::new(MemoryUnlockLedger::new()),
//!     Arc::new(CacheStore::new(Arc::new(MemoryCacheBackend::new()))),
//!     CacheTtls::default(),
//! );
//! engine.initialize().await;
//!
//! let user = UserId::from("u1");
//! events.emit(BetaEnrolledEvent::new(user.clone())).await.settled().await;
//!
//! assert!(engine.is_unlocked(&user, AchievementId::BetaTester).await?);
//! # Ok(())
//! # }
//! ```

pub mod definitions;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod registry;

#[cfg(test)]
mod tests;

pub use engine::{
    user_cache_key, AchievementEngine, CacheTtls, UnlockedAchievementView, CATALOG_CACHE_KEY,
};
pub use error::{EngineError, LedgerError};
pub use ledger::{MemoryUnlockLedger, UnlockLedger, UnlockRecord};
#[cfg(feature = "mongodb")]
pub use ledger::MongoUnlockLedger;
pub use registry::{
    AchievementDefinition, AchievementMeta, AchievementRegistry, UnlockOutcome, Unlocker,
};
