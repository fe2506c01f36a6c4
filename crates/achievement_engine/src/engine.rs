//! The achievement engine: event wiring, idempotent unlocks and cached queries.

use crate::error::{EngineError, LedgerError};
use crate::ledger::{UnlockLedger, UnlockRecord};
use crate::registry::{AchievementMeta, AchievementRegistry, UnlockOutcome, Unlocker};
use accolade_cache::CacheStore;
use accolade_event_system::{
    AchievementId, AchievementUnlockedEvent, DomainEvent, EventError, EventSystem, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key of the static catalog.
pub const CATALOG_CACHE_KEY: &str = "achievements:catalog";

/// Cache key of one user's unlocked list.
pub fn user_cache_key(user_id: &UserId) -> String {
    format!("achievements:user:{}", user_id)
}

/// Description given to unlocked achievements missing from the catalog.
const FALLBACK_DESCRIPTION: &str = "Achievement";

/// How long cached query results live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Static catalog
    pub catalog: Duration,
    /// Per-user unlocked lists
    pub user: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            catalog: Duration::from_secs(86_400),
            user: Duration::from_secs(300),
        }
    }
}

/// An unlocked achievement joined with its display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockedAchievementView {
    pub id: String,
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<String>,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl UnlockedAchievementView {
    fn from_record(record: UnlockRecord, meta: Option<&AchievementMeta>) -> Self {
        match meta {
            Some(meta) => Self {
                id: record.achievement_id,
                label: meta.label.clone(),
                description: meta.description.clone(),
                icon: meta.icon.clone(),
                badge_id: meta.badge_id.clone(),
                unlocked_at: record.unlocked_at,
                data: record.data,
            },
            None => Self {
                label: record.achievement_id.clone(),
                id: record.achievement_id,
                description: FALLBACK_DESCRIPTION.to_string(),
                icon: None,
                badge_id: None,
                unlocked_at: record.unlocked_at,
                data: record.data,
            },
        }
    }
}

/// Listens for domain events, unlocks achievements exactly once per user and
/// serves the catalog and per-user lists through the cache.
///
/// The engine owns no globals: construct it with its bus, registry, ledger
/// and cache, then call [`AchievementEngine::initialize`] once.
pub struct AchievementEngine {
    events: Arc<EventSystem>,
    registry: AchievementRegistry,
    ledger: Arc<dyn UnlockLedger>,
    cache: Arc<CacheStore>,
    ttls: CacheTtls,
    initialized: AtomicBool,
}

impl std::fmt::Debug for AchievementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AchievementEngine")
            .field("registry", &self.registry)
            .field("ledger", &self.ledger.ledger_name())
            .field("cache", &self.cache)
            .field("ttls", &self.ttls)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl AchievementEngine {
    pub fn new(
        events: Arc<EventSystem>,
        registry: AchievementRegistry,
        ledger: Arc<dyn UnlockLedger>,
        cache: Arc<CacheStore>,
        ttls: CacheTtls,
    ) -> Arc<Self> {
        Arc::new(Self {
            events,
            registry,
            ledger,
            cache,
            ttls,
            initialized: AtomicBool::new(false),
        })
    }

    /// Subscribes every definition to the event kinds it listens to and
    /// registers the cache invalidation listener.
    ///
    /// Only the first call does anything; later calls return `false`.
    pub async fn initialize(self: &Arc<Self>) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Achievement engine already initialized");
            return false;
        }

        for definition in self.registry.definitions() {
            for &kind in definition.listens_to() {
                let engine = Arc::downgrade(self);
                let definition = definition.clone();

                self.events
                    .on(kind, definition.id().as_str(), move |event: Arc<DomainEvent>| {
                        let engine = engine.clone();
                        let definition = definition.clone();
                        async move {
                            let Some(engine) = engine.upgrade() else {
                                return Ok(());
                            };
                            let unlocker: &AchievementEngine = &engine;
                            definition
                                .handle(&event, unlocker)
                                .await
                                .map_err(|e| {
                                    EventError::HandlerExecution(format!("{}: {}", definition.id(), e))
                                })
                        }
                    })
                    .await;
            }
        }

        let cache = self.cache.clone();
        self.events
            .on_typed("cache_invalidation", move |event: AchievementUnlockedEvent| {
                let cache = cache.clone();
                async move {
                    cache.invalidate(&user_cache_key(&event.user_id)).await;
                    Ok(())
                }
            })
            .await;

        info!(
            "🏅 Achievement engine initialized with {} definitions (ledger: {}, cache: {})",
            self.registry.definitions().len(),
            self.ledger.ledger_name(),
            self.cache.backend_name()
        );
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Records the unlock of `achievement_id` for `user_id` if it is not
    /// recorded yet.
    ///
    /// On a new unlock, emits [`AchievementUnlockedEvent`] and waits for its
    /// handlers, so the user's cached list is already invalidated when this
    /// returns. A duplicate reported by the ledger (a concurrent unlock won)
    /// is [`UnlockOutcome::AlreadyUnlocked`], not an error.
    pub async fn unlock(
        &self,
        user_id: &UserId,
        achievement_id: AchievementId,
        data: Option<Value>,
    ) -> Result<UnlockOutcome, EngineError> {
        if self
            .ledger
            .find_one(user_id, achievement_id.as_str())
            .await?
            .is_some()
        {
            debug!("{} already unlocked for {}", achievement_id, user_id);
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }

        let record = UnlockRecord::new(user_id.clone(), achievement_id.as_str(), Utc::now(), data);
        let record = match self.ledger.insert(record).await {
            Ok(record) => record,
            Err(LedgerError::Duplicate { .. }) => {
                debug!("Lost unlock race for {} / {}", user_id, achievement_id);
                return Ok(UnlockOutcome::AlreadyUnlocked);
            }
            Err(e) => return Err(e.into()),
        };

        info!("🏆 Unlocked {} for user {}", achievement_id, user_id);

        let report = self
            .events
            .emit(AchievementUnlockedEvent {
                user_id: user_id.clone(),
                achievement_id,
                unlocked_at: record.unlocked_at,
            })
            .await
            .settled()
            .await;
        if report.failed > 0 {
            warn!(
                "⚠️ {} listeners failed for unlock of {} by {}",
                report.failed, achievement_id, user_id
            );
        }

        Ok(UnlockOutcome::Unlocked(record))
    }

    /// The full catalog, served from the cache when possible.
    pub async fn list_all_achievements(&self) -> Vec<AchievementMeta> {
        self.cache
            .cached(CATALOG_CACHE_KEY, self.ttls.catalog, || async {
                Ok::<_, Infallible>(self.registry.metadata().to_vec())
            })
            .await
            .unwrap_or_else(|never| match never {})
    }

    /// Achievements `user_id` has unlocked, oldest first, served from the
    /// cache when possible.
    ///
    /// Records whose id is not in the catalog are still listed, labelled with
    /// their raw id.
    pub async fn get_user_achievements(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UnlockedAchievementView>, EngineError> {
        self.cache
            .cached(&user_cache_key(user_id), self.ttls.user, || async {
                let records = self.ledger.find_all(user_id).await?;
                Ok::<_, EngineError>(
                    records
                        .into_iter()
                        .map(|record| {
                            let meta = self.registry.meta_by_str(&record.achievement_id);
                            UnlockedAchievementView::from_record(record, meta)
                        })
                        .collect(),
                )
            })
            .await
    }

    /// Whether the pair is recorded, read straight from the ledger.
    pub async fn is_unlocked(
        &self,
        user_id: &UserId,
        achievement_id: AchievementId,
    ) -> Result<bool, EngineError> {
        Ok(self
            .ledger
            .find_one(user_id, achievement_id.as_str())
            .await?
            .is_some())
    }

    pub fn achievement(&self, id: AchievementId) -> Option<AchievementMeta> {
        self.registry.meta(id).cloned()
    }

    pub fn events(&self) -> &Arc<EventSystem> {
        &self.events
    }

    pub fn registry(&self) -> &AchievementRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}

#[async_trait]
impl Unlocker for AchievementEngine {
    async fn unlock(
        &self,
        user_id: &UserId,
        achievement_id: AchievementId,
        data: Option<Value>,
    ) -> Result<UnlockOutcome, EngineError> {
        AchievementEngine::unlock(self, user_id, achievement_id, data).await
    }
}
