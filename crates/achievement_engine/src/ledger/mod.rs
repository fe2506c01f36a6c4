//! Durable record of which user unlocked which achievement.
//!
//! The ledger enforces one record per (user, achievement) pair. That
//! constraint, not the engine's lookup before insert, is what keeps two
//! racing unlocks from both succeeding.

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemoryUnlockLedger;
#[cfg(feature = "mongodb")]
pub use mongo::MongoUnlockLedger;

use crate::error::LedgerError;
use accolade_event_system::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unlock, created once and never modified.
///
/// `achievement_id` is kept in its string form so records written for
/// achievements that were later removed from the catalog stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub user_id: UserId,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl UnlockRecord {
    pub fn new(
        user_id: UserId,
        achievement_id: impl Into<String>,
        unlocked_at: DateTime<Utc>,
        data: Option<Value>,
    ) -> Self {
        Self {
            user_id,
            achievement_id: achievement_id.into(),
            unlocked_at,
            data,
        }
    }
}

/// Storage for unlock records.
#[async_trait]
pub trait UnlockLedger: Send + Sync {
    async fn find_one(
        &self,
        user_id: &UserId,
        achievement_id: &str,
    ) -> Result<Option<UnlockRecord>, LedgerError>;

    /// Stores `record`, failing with [`LedgerError::Duplicate`] if the pair is
    /// already recorded.
    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError>;

    /// Every record for `user_id`, oldest first.
    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError>;

    fn ledger_name(&self) -> &str;
}
