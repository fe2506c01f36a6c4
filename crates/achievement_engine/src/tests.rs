//! Engine behaviour across the bus, ledger and cache.

use crate::definitions::{builtin_metadata, BetaTester};
use crate::{
    user_cache_key, AchievementDefinition, AchievementEngine, AchievementRegistry, CacheTtls,
    EngineError, LedgerError, MemoryUnlockLedger, UnlockLedger, UnlockOutcome, UnlockRecord,
    Unlocker, CATALOG_CACHE_KEY,
};
use accolade_cache::{CacheBackend, CacheError, CacheStore, MemoryCacheBackend, ScanPage};
use accolade_event_system::{
    AchievementId, AchievementUnlockedEvent, BadgeSelectedEvent, BetaEnrolledEvent, DomainEvent,
    EventError, EventKind, EventSystem, ProfileUpdatedEvent, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Ledger that yields before every lookup so concurrent unlocks interleave
/// between the existence check and the insert.
struct YieldingLedger(MemoryUnlockLedger);

#[async_trait]
impl UnlockLedger for YieldingLedger {
    async fn find_one(
        &self,
        user_id: &UserId,
        achievement_id: &str,
    ) -> Result<Option<UnlockRecord>, LedgerError> {
        tokio::task::yield_now().await;
        self.0.find_one(user_id, achievement_id).await
    }

    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        self.0.insert(record).await
    }

    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        self.0.find_all(user_id).await
    }

    fn ledger_name(&self) -> &str {
        "yielding"
    }
}

/// Ledger that holds the first `find_all` after taking its snapshot until
/// `release` is notified.
#[derive(Default)]
struct ParkingLedger {
    inner: MemoryUnlockLedger,
    armed: AtomicBool,
    parked: Notify,
    release: Notify,
}

#[async_trait]
impl UnlockLedger for ParkingLedger {
    async fn find_one(
        &self,
        user_id: &UserId,
        achievement_id: &str,
    ) -> Result<Option<UnlockRecord>, LedgerError> {
        self.inner.find_one(user_id, achievement_id).await
    }

    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        self.inner.insert(record).await
    }

    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        let records = self.inner.find_all(user_id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        Ok(records)
    }

    fn ledger_name(&self) -> &str {
        "parking"
    }
}

/// Ledger whose existence check never sees a record, so every repeat unlock
/// reaches the insert.
#[derive(Default)]
struct BlindLedger(MemoryUnlockLedger);

#[async_trait]
impl UnlockLedger for BlindLedger {
    async fn find_one(&self, _: &UserId, _: &str) -> Result<Option<UnlockRecord>, LedgerError> {
        Ok(None)
    }

    async fn insert(&self, record: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        self.0.insert(record).await
    }

    async fn find_all(&self, user_id: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        self.0.find_all(user_id).await
    }

    fn ledger_name(&self) -> &str {
        "blind"
    }
}

/// Ledger whose store is unreachable.
struct DownLedger;

#[async_trait]
impl UnlockLedger for DownLedger {
    async fn find_one(&self, _: &UserId, _: &str) -> Result<Option<UnlockRecord>, LedgerError> {
        Err(LedgerError::Unavailable("no route to host".to_string()))
    }

    async fn insert(&self, _: UnlockRecord) -> Result<UnlockRecord, LedgerError> {
        Err(LedgerError::Unavailable("no route to host".to_string()))
    }

    async fn find_all(&self, _: &UserId) -> Result<Vec<UnlockRecord>, LedgerError> {
        Err(LedgerError::Unavailable("no route to host".to_string()))
    }

    fn ledger_name(&self) -> &str {
        "down"
    }
}

/// Cache backend that refuses every command.
struct DownCache;

#[async_trait]
impl CacheBackend for DownCache {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set_with_ttl(&self, _: &str, _: String, _: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete_many(&self, _: &[String]) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn scan(&self, _: &str, _: u64, _: usize) -> Result<ScanPage, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    fn backend_name(&self) -> &str {
        "down"
    }
}

/// Definition that always fails while evaluating a beta enrollment.
struct BrokenDefinition;

#[async_trait]
impl AchievementDefinition for BrokenDefinition {
    fn id(&self) -> AchievementId {
        AchievementId::FirstSteps
    }

    fn listens_to(&self) -> &'static [EventKind] {
        &[EventKind::BetaEnrolled]
    }

    async fn handle(&self, _event: &DomainEvent, _unlocker: &dyn Unlocker) -> Result<(), EngineError> {
        Err(EngineError::Ledger(LedgerError::Backend("rule evaluation failed".to_string())))
    }
}

struct Harness {
    events: Arc<EventSystem>,
    ledger: Arc<MemoryUnlockLedger>,
    cache_backend: Arc<MemoryCacheBackend>,
    engine: Arc<AchievementEngine>,
    unlocked_events: Arc<AtomicUsize>,
}

/// Builds an engine over in-memory backends with a counter on
/// `AchievementUnlocked`. The engine is not initialized yet.
async fn harness() -> Harness {
    let events = Arc::new(EventSystem::new());
    let ledger = Arc::new(MemoryUnlockLedger::new());
    let cache_backend = Arc::new(MemoryCacheBackend::new());
    let engine = AchievementEngine::new(
        events.clone(),
        AchievementRegistry::builtin(),
        ledger.clone(),
        Arc::new(CacheStore::new(cache_backend.clone())),
        CacheTtls::default(),
    );

    let unlocked_events = Arc::new(AtomicUsize::new(0));
    let counter = unlocked_events.clone();
    events
        .on_typed("unlock_counter", move |_event: AchievementUnlockedEvent| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

    Harness {
        events,
        ledger,
        cache_backend,
        engine,
        unlocked_events,
    }
}

async fn initialized_harness() -> Harness {
    let harness = harness().await;
    harness.engine.initialize().await;
    harness
}

fn u1() -> UserId {
    UserId::from("u1")
}

#[tokio::test]
async fn test_beta_enrollment_unlocks_beta_tester_once() {
    let h = initialized_harness().await;

    let report = h.events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;
    assert_eq!(report.failed, 0);

    let unlocked = h.engine.get_user_achievements(&u1()).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "BETA_TESTER");
    assert_eq!(unlocked[0].label, "Beta Tester");
    assert_eq!(unlocked[0].badge_id.as_deref(), Some("beta-tester"));
    assert!(unlocked[0].unlocked_at <= Utc::now());

    h.events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;

    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.unlocked_events.load(Ordering::SeqCst), 1);
    assert_eq!(h.engine.get_user_achievements(&u1()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unlock_is_idempotent() {
    let h = initialized_harness().await;

    let first = h
        .engine
        .unlock(&u1(), AchievementId::FirstSteps, Some(json!({ "source": "test" })))
        .await
        .unwrap();
    let second = h
        .engine
        .unlock(&u1(), AchievementId::FirstSteps, None)
        .await
        .unwrap();

    match first {
        UnlockOutcome::Unlocked(record) => {
            assert_eq!(record.achievement_id, "FIRST_STEPS");
            assert_eq!(record.data, Some(json!({ "source": "test" })));
        }
        other => panic!("expected a new unlock, got {:?}", other),
    }
    assert_eq!(second, UnlockOutcome::AlreadyUnlocked);
    assert_eq!(h.ledger.len(), 1);
    assert_eq!(h.unlocked_events.load(Ordering::SeqCst), 1);

    let stored = h.ledger.find_one(&u1(), "FIRST_STEPS").await.unwrap().unwrap();
    assert_eq!(stored.data, Some(json!({ "source": "test" })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unlocks_record_once() {
    let events = Arc::new(EventSystem::new());
    let ledger = Arc::new(YieldingLedger(MemoryUnlockLedger::new()));
    let engine = AchievementEngine::new(
        events.clone(),
        AchievementRegistry::builtin(),
        ledger.clone(),
        Arc::new(CacheStore::new(Arc::new(MemoryCacheBackend::new()))),
        CacheTtls::default(),
    );
    engine.initialize().await;

    let unlocked_events = Arc::new(AtomicUsize::new(0));
    let counter = unlocked_events.clone();
    events
        .on_typed("unlock_counter", move |_event: AchievementUnlockedEvent| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .unlock(&UserId::from("u1"), AchievementId::BetaTester, None)
                    .await
            })
        })
        .collect();

    let mut new_unlocks = 0;
    for task in tasks {
        if task.await.unwrap().unwrap().is_new() {
            new_unlocks += 1;
        }
    }

    assert_eq!(new_unlocks, 1);
    assert_eq!(ledger.0.len(), 1);
    assert_eq!(unlocked_events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unlock_invalidates_cached_user_list() {
    let h = initialized_harness().await;
    let key = user_cache_key(&u1());

    assert!(h.engine.get_user_achievements(&u1()).await.unwrap().is_empty());
    assert!(h.cache_backend.contains_key(&key));

    h.engine
        .unlock(&u1(), AchievementId::BetaTester, None)
        .await
        .unwrap();
    assert!(!h.cache_backend.contains_key(&key));

    let unlocked = h.engine.get_user_achievements(&u1()).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "BETA_TESTER");
}

#[tokio::test]
async fn test_read_racing_an_unlock_does_not_cache_stale_list() {
    let ledger = Arc::new(ParkingLedger::default());
    let engine = AchievementEngine::new(
        Arc::new(EventSystem::new()),
        AchievementRegistry::builtin(),
        ledger.clone(),
        Arc::new(CacheStore::new(Arc::new(MemoryCacheBackend::new()))),
        CacheTtls::default(),
    );
    engine.initialize().await;
    ledger.armed.store(true, Ordering::SeqCst);

    let reader = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.get_user_achievements(&u1()).await })
    };
    ledger.parked.notified().await;

    engine
        .unlock(&u1(), AchievementId::BetaTester, None)
        .await
        .unwrap();
    ledger.release.notify_one();

    // The racing read may see the old list, but must not cache it
    assert!(reader.await.unwrap().unwrap().is_empty());

    let unlocked = engine.get_user_achievements(&u1()).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "BETA_TESTER");
}

#[tokio::test]
async fn test_duplicate_insert_is_already_unlocked() {
    let events = Arc::new(EventSystem::new());
    let ledger = Arc::new(BlindLedger::default());
    let engine = AchievementEngine::new(
        events.clone(),
        AchievementRegistry::builtin(),
        ledger.clone(),
        Arc::new(CacheStore::new(Arc::new(MemoryCacheBackend::new()))),
        CacheTtls::default(),
    );
    engine.initialize().await;

    let unlocked_events = Arc::new(AtomicUsize::new(0));
    let counter = unlocked_events.clone();
    events
        .on_typed("unlock_counter", move |_event: AchievementUnlockedEvent| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

    let first = engine
        .unlock(&u1(), AchievementId::Trendsetter, None)
        .await
        .unwrap();
    let second = engine
        .unlock(&u1(), AchievementId::Trendsetter, None)
        .await
        .unwrap();

    assert!(first.is_new());
    assert_eq!(second, UnlockOutcome::AlreadyUnlocked);
    assert_eq!(ledger.0.len(), 1);
    assert_eq!(unlocked_events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_other_users_cache_is_untouched() {
    let h = initialized_harness().await;
    let other = UserId::from("u2");

    h.engine.get_user_achievements(&other).await.unwrap();
    h.engine
        .unlock(&u1(), AchievementId::BetaTester, None)
        .await
        .unwrap();

    assert!(h.cache_backend.contains_key(&user_cache_key(&other)));
}

#[tokio::test]
async fn test_catalog_is_served_from_cache() {
    let h = initialized_harness().await;

    let first = h.engine.list_all_achievements().await;
    let second = h.engine.list_all_achievements().await;

    assert_eq!(first.len(), AchievementId::ALL.len());
    assert_eq!(first, second);
    assert!(h.cache_backend.contains_key(CATALOG_CACHE_KEY));
    assert_eq!(h.engine.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_queries_work_with_cache_down() {
    let events = Arc::new(EventSystem::new());
    let ledger = Arc::new(MemoryUnlockLedger::new());
    let engine = AchievementEngine::new(
        events.clone(),
        AchievementRegistry::builtin(),
        ledger.clone(),
        Arc::new(CacheStore::new(Arc::new(DownCache))),
        CacheTtls::default(),
    );
    engine.initialize().await;

    assert!(engine.get_user_achievements(&u1()).await.unwrap().is_empty());

    let report = events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;
    assert_eq!(report.failed, 0);

    let unlocked = engine.get_user_achievements(&u1()).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(engine.list_all_achievements().await.len(), AchievementId::ALL.len());
    assert!(engine.cache().stats().errors > 0);
}

#[tokio::test]
async fn test_unknown_achievement_gets_fallback_metadata() {
    let h = initialized_harness().await;
    h.ledger
        .insert(UnlockRecord::new(u1(), "LEGACY_PIONEER", Utc::now(), None))
        .await
        .unwrap();

    let unlocked = h.engine.get_user_achievements(&u1()).await.unwrap();

    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "LEGACY_PIONEER");
    assert_eq!(unlocked[0].label, "LEGACY_PIONEER");
    assert_eq!(unlocked[0].description, "Achievement");
    assert_eq!(unlocked[0].icon, None);
    assert_eq!(unlocked[0].badge_id, None);
}

#[tokio::test]
async fn test_failing_definition_does_not_block_sibling_definition() {
    let events = Arc::new(EventSystem::new());
    let ledger = Arc::new(MemoryUnlockLedger::new());
    let registry = AchievementRegistry::new(
        vec![Arc::new(BrokenDefinition), Arc::new(BetaTester)],
        builtin_metadata(),
    );
    let engine = AchievementEngine::new(
        events.clone(),
        registry,
        ledger.clone(),
        Arc::new(CacheStore::new(Arc::new(MemoryCacheBackend::new()))),
        CacheTtls::default(),
    );
    engine.initialize().await;
    assert_eq!(events.handler_count(EventKind::BetaEnrolled), 2);

    let report = events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert!(engine.is_unlocked(&u1(), AchievementId::BetaTester).await.unwrap());
    assert!(!engine.is_unlocked(&u1(), AchievementId::FirstSteps).await.unwrap());
    assert_eq!(events.get_stats().await.handler_failures, 1);
}

#[tokio::test]
async fn test_failing_handler_does_not_block_unlock() {
    let h = harness().await;
    h.events
        .on_typed("broken_welcome_mail", |_event: BetaEnrolledEvent| async move {
            Err(EventError::HandlerExecution("smtp down".to_string()))
        })
        .await;
    h.engine.initialize().await;

    let report = h.events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert!(h
        .engine
        .is_unlocked(&u1(), AchievementId::BetaTester)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_double_initialize_does_not_double_dispatch() {
    let h = harness().await;

    assert!(h.engine.initialize().await);
    assert!(!h.engine.initialize().await);
    assert!(h.engine.is_initialized());
    assert_eq!(h.events.handler_count(EventKind::BetaEnrolled), 1);

    let report = h.events.emit(BetaEnrolledEvent::new(u1())).await.settled().await;

    assert_eq!(report.completed, 1);
    assert_eq!(h.unlocked_events.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_every_definition_is_subscribed() {
    let h = initialized_harness().await;

    for kind in [
        EventKind::BetaEnrolled,
        EventKind::UserRegistered,
        EventKind::ProfileUpdated,
        EventKind::BadgeSelected,
    ] {
        assert_eq!(h.events.handler_count(kind), 1, "{} not wired", kind);
    }
    // Counter plus the cache invalidation listener
    assert_eq!(h.events.handler_count(EventKind::AchievementUnlocked), 2);
}

#[tokio::test]
async fn test_profile_complete_requires_complete_profile() {
    let h = initialized_harness().await;

    h.events
        .emit(ProfileUpdatedEvent {
            user_id: u1(),
            profile_complete: false,
        })
        .await
        .settled()
        .await;
    assert!(!h
        .engine
        .is_unlocked(&u1(), AchievementId::ProfileComplete)
        .await
        .unwrap());

    h.events
        .emit(ProfileUpdatedEvent {
            user_id: u1(),
            profile_complete: true,
        })
        .await
        .settled()
        .await;
    assert!(h
        .engine
        .is_unlocked(&u1(), AchievementId::ProfileComplete)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_trendsetter_records_selected_badge() {
    let h = initialized_harness().await;

    h.events
        .emit(BadgeSelectedEvent {
            user_id: u1(),
            badge_id: "beta-tester".to_string(),
        })
        .await
        .settled()
        .await;
    h.events
        .emit(BadgeSelectedEvent {
            user_id: u1(),
            badge_id: "gold".to_string(),
        })
        .await
        .settled()
        .await;

    let unlocked = h.engine.get_user_achievements(&u1()).await.unwrap();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].id, "TRENDSETTER");
    assert_eq!(unlocked[0].data, Some(json!({ "badge_id": "beta-tester" })));
}

#[tokio::test]
async fn test_definition_rejects_other_payloads() {
    let h = initialized_harness().await;
    let event = DomainEvent::BadgeSelected(BadgeSelectedEvent {
        user_id: u1(),
        badge_id: "gold".to_string(),
    });

    let unlocker: &AchievementEngine = &h.engine;
    let err = BetaTester.handle(&event, unlocker).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::Event(EventError::PayloadMismatch {
            expected: EventKind::BetaEnrolled,
            actual: EventKind::BadgeSelected,
        })
    ));
    assert!(h.ledger.is_empty());
}

#[tokio::test]
async fn test_ledger_failure_propagates() {
    let cache_backend = Arc::new(MemoryCacheBackend::new());
    let engine = AchievementEngine::new(
        Arc::new(EventSystem::new()),
        AchievementRegistry::builtin(),
        Arc::new(DownLedger),
        Arc::new(CacheStore::new(cache_backend.clone())),
        CacheTtls::default(),
    );
    engine.initialize().await;

    let err = engine
        .unlock(&u1(), AchievementId::BetaTester, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Unavailable(_))));

    assert!(engine.get_user_achievements(&u1()).await.is_err());
    assert!(!cache_backend.contains_key(&user_cache_key(&u1())));
}

#[tokio::test]
async fn test_achievement_lookup() {
    let h = initialized_harness().await;

    let meta = h.engine.achievement(AchievementId::BetaTester).unwrap();
    assert_eq!(meta.badge_id.as_deref(), Some("beta-tester"));
    assert!(h.engine.achievement(AchievementId::Trendsetter).is_some());
}
