//! Error types for the unlock ledger and the engine.

use accolade_event_system::{EventError, UserId};

/// Errors reported by an [`crate::UnlockLedger`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A record for this (user, achievement) pair already exists
    #[error("Achievement {achievement_id} already recorded for user {user_id}")]
    Duplicate {
        user_id: UserId,
        achievement_id: String,
    },
    /// The ledger store cannot be reached
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
    /// The store was reached but the operation failed
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LedgerError::Duplicate { .. })
    }
}

/// Errors returned by [`crate::AchievementEngine`] and achievement definitions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// A definition was handed an event it cannot read
    #[error(transparent)]
    Event(#[from] EventError),
}
