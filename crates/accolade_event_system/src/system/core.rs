/// Core EventSystem implementation
use super::stats::EventSystemStats;
use crate::events::{EventHandler, EventKind, HandlerId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One subscription on the bus.
#[derive(Clone)]
pub(super) struct Registration {
    pub(super) id: HandlerId,
    pub(super) once: bool,
    pub(super) handler: Arc<dyn EventHandler>,
}

/// The event bus that routes domain events to their handlers.
///
/// Handlers are stored per [`EventKind`] in registration order. The system is
/// shared as `Arc<EventSystem>`; registration, removal and emission all take
/// `&self`.
///
/// Each instance is independent: constructing two event systems gives two
/// buses that never see each other's events.
pub struct EventSystem {
    /// Map of event kinds to their registered handlers
    pub(super) handlers: DashMap<EventKind, Vec<Registration>>,
    /// System statistics for monitoring
    pub(super) stats: Arc<RwLock<EventSystemStats>>,
    next_handler_id: AtomicU64,
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("handlers", &"[handlers]")
            .field("stats", &"[stats]")
            .finish()
    }
}

impl EventSystem {
    /// Creates a new event system with no registered handlers.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            stats: Arc::new(RwLock::new(EventSystemStats::default())),
            next_handler_id: AtomicU64::new(1),
        }
    }

    pub(super) fn allocate_handler_id(&self) -> HandlerId {
        HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .get(&kind)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Event kinds with at least one registered handler.
    pub fn registered_kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self
            .handlers
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect();
        kinds.sort();
        kinds
    }

    /// Gets the current event system statistics
    pub async fn get_stats(&self) -> EventSystemStats {
        self.stats.read().await.clone()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}
