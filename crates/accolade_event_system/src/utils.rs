//! # Utility Functions
//!
//! Factory helpers shared by the engine and the service host.

use crate::system::EventSystem;
use std::sync::Arc;

/// Creates a new event system wrapped in an `Arc` for sharing between the
/// engine, its handlers and whatever emits domain events.
pub fn create_event_system() -> Arc<EventSystem> {
    Arc::new(EventSystem::new())
}
