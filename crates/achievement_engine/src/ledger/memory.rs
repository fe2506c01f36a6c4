use super::{UnlockLedger, UnlockRecord};
use crate::error::LedgerError;
use accolade_event_system::UserId;
use async_trait::async_trait;
use dashmap::DashMap;

/// Ledger kept in process memory, keyed by user.
///
/// The duplicate check and the insert happen under the same shard lock, so
/// the uniqueness constraint holds under concurrent inserts.
#[derive(Debug, Default)]
pub struct MemoryUnlockLedger {
    records: DashMap<UserId, Vec<UnlockRecord>>,
}

impl MemoryUnlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all users.
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UnlockLedger for MemoryUnlockLedger {
    async fn find_one(
        &self,
        user_id: &UserId,
        achievement_id: &str,
    ) -> Result<Option<UnlockRecord>, LedgerError> {
        Ok(self.records.get(user_id).and_then(|records| {
            records
                .iter()
                .find(|record| record.achievement_id == achievement_id)
                .cloned()
        }))
    }

    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        let mut records = self.records.entry(record.user_id.clone()).or_default();
        if records
            .iter()
            .any(|existing| existing.achievement_id == record.achievement_id)
        {
            return Err(LedgerError::Duplicate {
                user_id: record.user_id,
                achievement_id: record.achievement_id,
            });
        }

        records.push(record.clone());
        Ok(record)
    }

    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        Ok(self
            .records
            .get(user_id)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }

    fn ledger_name(&self) -> &str {
        "memory"
    }
}
