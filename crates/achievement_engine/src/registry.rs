//! Achievement definitions, display metadata and the registry holding both.

use crate::definitions;
use crate::error::EngineError;
use crate::ledger::UnlockRecord;
use accolade_event_system::{AchievementId, DomainEvent, EventKind, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Result of an unlock request.
#[derive(Debug, Clone, PartialEq)]
pub enum UnlockOutcome {
    /// The pair was locked and is now recorded
    Unlocked(UnlockRecord),
    /// The pair was already recorded; nothing changed
    AlreadyUnlocked,
}

impl UnlockOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UnlockOutcome::Unlocked(_))
    }
}

/// The capability a definition is given to record an unlock.
#[async_trait]
pub trait Unlocker: Send + Sync {
    async fn unlock(
        &self,
        user_id: &UserId,
        achievement_id: AchievementId,
        data: Option<Value>,
    ) -> Result<UnlockOutcome, EngineError>;
}

/// A rule that watches domain events and decides when to unlock one
/// achievement.
///
/// The engine routes every event whose kind is in [`listens_to`] to
/// [`handle`]. A definition may unlock unconditionally or inspect the payload
/// first; unlocking an already unlocked pair is harmless.
///
/// [`listens_to`]: AchievementDefinition::listens_to
/// [`handle`]: AchievementDefinition::handle
#[async_trait]
pub trait AchievementDefinition: Send + Sync {
    fn id(&self) -> AchievementId;

    /// Event kinds this definition subscribes to. Never empty.
    fn listens_to(&self) -> &'static [EventKind];

    async fn handle(&self, event: &DomainEvent, unlocker: &dyn Unlocker) -> Result<(), EngineError>;
}

/// Display data for one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementMeta {
    pub id: AchievementId,
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Badge the user may display once this achievement is unlocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<String>,
}

impl AchievementMeta {
    pub fn new(id: AchievementId, label: &str, description: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
            description: description.to_string(),
            icon: None,
            badge_id: None,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_badge(mut self, badge_id: &str) -> Self {
        self.badge_id = Some(badge_id.to_string());
        self
    }
}

/// The static catalog: definitions plus their metadata.
///
/// Built once and handed to the engine; nothing mutates it afterwards.
#[derive(Clone)]
pub struct AchievementRegistry {
    definitions: Vec<Arc<dyn AchievementDefinition>>,
    metadata: Vec<AchievementMeta>,
}

impl std::fmt::Debug for AchievementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AchievementRegistry")
            .field(
                "definitions",
                &self.definitions.iter().map(|d| d.id()).collect::<Vec<_>>(),
            )
            .field("metadata", &self.metadata.len())
            .finish()
    }
}

impl AchievementRegistry {
    pub fn new(definitions: Vec<Arc<dyn AchievementDefinition>>, metadata: Vec<AchievementMeta>) -> Self {
        Self {
            definitions,
            metadata,
        }
    }

    /// The catalog shipped with the application.
    pub fn builtin() -> Self {
        Self::new(definitions::builtin_definitions(), definitions::builtin_metadata())
    }

    pub fn definitions(&self) -> &[Arc<dyn AchievementDefinition>] {
        &self.definitions
    }

    /// Metadata in catalog order.
    pub fn metadata(&self) -> &[AchievementMeta] {
        &self.metadata
    }

    pub fn meta(&self, id: AchievementId) -> Option<&AchievementMeta> {
        self.metadata.iter().find(|meta| meta.id == id)
    }

    /// Looks metadata up by the string form stored in unlock records.
    pub fn meta_by_str(&self, id: &str) -> Option<&AchievementMeta> {
        id.parse::<AchievementId>().ok().and_then(|id| self.meta(id))
    }
}
