//! # Accolade Event System
//!
//! An in-process, type-safe publish/subscribe bus for the domain events that
//! drive achievement unlocks. Any component of the application may emit an
//! event; subscribers (achievement definitions, cache invalidation, audit
//! hooks) react to it without the emitter knowing who they are.
//!
//! ## Core Features
//!
//! - **Closed event set**: every event is a variant of [`DomainEvent`] with
//!   exactly one payload struct, routed by its [`EventKind`]
//! - **Typed subscription**: [`EventSystem::on_typed`] hands the handler the
//!   concrete payload, so a handler can never receive the wrong shape
//! - **Fire-and-forget emission**: [`EventSystem::emit`] starts every handler
//!   as its own task and returns an [`EmitHandle`] that can be awaited when
//!   completion matters
//! - **Handler isolation**: errors and panics are caught and logged per
//!   handler and never reach the emitter or sibling handlers
//! - **Statistics**: built-in counters for monitoring
//!
//! ## Quick Start
//!
//! ```rust
//! use accolade_event_system::*;
//!
//! # async fn example() {
//! let events = create_event_system();
//!
//! events
//!     .on_typed("welcome", |event: UserRegisteredEvent| async move {
//!         println!("user {} registered", event.user_id);
//!         Ok(())
//!     })
//!     .await;
//!
//! let report = events
//!     .emit(UserRegisteredEvent::new(UserId::from("u1")))
//!     .await
//!     .settled()
//!     .await;
//! assert_eq!(report.completed, 1);
//! # }
//! ```

pub mod events;
pub mod system;
pub mod types;
pub mod utils;

pub use events::{
    AchievementUnlockedEvent, BadgeSelectedEvent, BetaEnrolledEvent, DomainEvent, Event,
    EventError, EventHandler, EventKind, FnEventHandler, HandlerId, ProfileUpdatedEvent,
    TypedEventHandler, UserRegisteredEvent,
};
pub use system::{EmitHandle, EmitReport, EventSystem, EventSystemStats};
pub use types::{AchievementId, UnknownAchievement, UserId};
pub use utils::create_event_system;
