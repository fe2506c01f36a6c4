//! Main application entry point for the accolade service
//!
//! Loads configuration, wires the cache and ledger backends into the
//! achievement engine, and reports health until shut down.

mod cli;
mod config;
mod logging;
mod signals;

use accolade_cache::{CacheStore, MemoryCacheBackend, RedisCacheBackend};
use accolade_event_system::{create_event_system, BetaEnrolledEvent, EventSystem, UserId};
use achievement_engine::{AchievementEngine, AchievementRegistry, MemoryUnlockLedger, UnlockLedger};
use cli::CliArgs;
use config::{AppConfig, CacheBackendKind, CacheSettings, LedgerBackendKind, LedgerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Applies command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }

    if args.json_logs {
        config.logging.json_format = true;
    }

    if let Some(backend) = args.cache_backend {
        config.cache.backend = backend;
    }

    if let Some(redis_url) = &args.redis_url {
        config.cache.redis_url = redis_url.clone();
    }
}

/// Builds the cache store. An unreachable Redis degrades to a disabled cache
/// instead of failing startup.
async fn build_cache(settings: &CacheSettings) -> CacheStore {
    if !settings.enabled {
        info!("🧊 Cache disabled, queries read the ledger directly");
        return CacheStore::disabled();
    }

    let store = match settings.backend {
        CacheBackendKind::Memory => CacheStore::new(Arc::new(MemoryCacheBackend::new())),
        CacheBackendKind::Redis => match RedisCacheBackend::connect(&settings.redis_url).await {
            Ok(backend) => CacheStore::new(Arc::new(backend)),
            Err(e) => {
                warn!("⚠️ Redis unavailable, running without cache: {}", e);
                CacheStore::disabled()
            }
        },
    };

    store.with_scan_batch(settings.scan_batch)
}

async fn build_ledger(
    settings: &LedgerSettings,
) -> Result<Arc<dyn UnlockLedger>, Box<dyn std::error::Error>> {
    match settings.backend {
        LedgerBackendKind::Memory => {
            warn!("⚠️ Using the in-memory unlock ledger; unlocks are lost on restart");
            Ok(Arc::new(MemoryUnlockLedger::new()))
        }
        LedgerBackendKind::Mongodb => connect_mongo_ledger(settings).await,
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongo_ledger(
    settings: &LedgerSettings,
) -> Result<Arc<dyn UnlockLedger>, Box<dyn std::error::Error>> {
    let ledger = achievement_engine::MongoUnlockLedger::connect(
        &settings.mongodb_uri,
        &settings.database,
        &settings.collection,
    )
    .await?;
    Ok(Arc::new(ledger))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongo_ledger(
    _settings: &LedgerSettings,
) -> Result<Arc<dyn UnlockLedger>, Box<dyn std::error::Error>> {
    Err("ledger backend `mongodb` requires building with the `mongodb` feature".into())
}

/// The running service: an initialized engine plus its event bus.
pub struct Application {
    config: AppConfig,
    config_path: PathBuf,
    simulate_user: Option<UserId>,
    events: Arc<EventSystem>,
    engine: Arc<AchievementEngine>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Configuration comes first; logging depends on it
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        apply_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        logging::setup_logging(&config.logging)?;
        display_banner();

        let cache = Arc::new(build_cache(&config.cache).await);
        let ledger = build_ledger(&config.ledger).await?;
        let events = create_event_system();

        let engine = AchievementEngine::new(
            events.clone(),
            AchievementRegistry::builtin(),
            ledger,
            cache,
            config.cache.ttls(),
        );
        engine.initialize().await;

        Ok(Self {
            config,
            config_path: args.config_path,
            simulate_user: args.simulate_user.map(UserId::from),
            events,
            engine,
        })
    }

    /// Runs until SIGINT/SIGTERM, logging health statistics every minute.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("📋 Configuration Summary:");
        info!("  📂 Config file: {}", self.config_path.display());
        info!(
            "  🧊 Cache: {} (catalog TTL {}s, user TTL {}s)",
            self.engine.cache().backend_name(),
            self.config.cache.catalog_ttl_secs,
            self.config.cache.user_ttl_secs
        );
        info!("  📒 Ledger: {}", self.config.ledger.backend);
        info!(
            "  🏅 Catalog: {} achievements",
            self.engine.list_all_achievements().await.len()
        );

        let initial_stats = self.events.get_stats().await;
        info!("📊 Initial Event System State:");
        info!("  - Handlers registered: {}", initial_stats.total_handlers);
        info!("  - Event kinds wired: {:?}", self.events.registered_kinds());

        if let Some(user_id) = &self.simulate_user {
            self.simulate_beta_enrollment(user_id).await?;
        }

        let monitoring_handle = {
            let events = self.events.clone();
            let cache = self.engine.cache().clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
                let mut last_events_emitted = 0u64;

                loop {
                    interval.tick().await;

                    let stats = events.get_stats().await;
                    let cache_stats = cache.stats();
                    let events_this_period = stats.events_emitted - last_events_emitted;
                    last_events_emitted = stats.events_emitted;

                    info!(
                        "📊 System Health - {} events/min | {} handlers | {} handler failures | cache {} hits / {} misses / {} errors",
                        events_this_period,
                        stats.total_handlers,
                        stats.handler_failures,
                        cache_stats.hits,
                        cache_stats.misses,
                        cache_stats.errors
                    );
                }
            })
        };

        info!("✅ Achievement engine is now running!");
        info!("🔍 Health monitoring active - stats every 60 seconds");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown().await?;

        info!("🛑 Shutdown signal received");
        monitoring_handle.abort();

        let final_stats = self.events.get_stats().await;
        let cache_stats = self.engine.cache().stats();
        info!("📊 Final Statistics:");
        info!("  - Total events processed: {}", final_stats.events_emitted);
        info!("  - Handler failures: {}", final_stats.handler_failures);
        info!("  - Cache invalidations: {}", cache_stats.invalidations);

        Ok(())
    }

    async fn simulate_beta_enrollment(&self, user_id: &UserId) -> Result<(), Box<dyn std::error::Error>> {
        info!("🧪 Simulating beta enrollment for {}", user_id);

        let report = self
            .events
            .emit(BetaEnrolledEvent::new(user_id.clone()))
            .await
            .settled()
            .await;
        info!(
            "🧪 {} handlers completed, {} failed",
            report.completed, report.failed
        );

        for unlocked in self.engine.get_user_achievements(user_id).await? {
            info!(
                "  🏆 {} - {} (unlocked {})",
                unlocked.label, unlocked.description, unlocked.unlocked_at
            );
        }
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🏅 ACCOLADE v{:<8}         ║", version);
    info!("║      Achievement Unlock Engine           ║");
    info!("╚══════════════════════════════════════════╝");
}
