//! Domain events, handler traits and event errors.
//!
//! Events form a closed set: [`DomainEvent`] has one variant per
//! [`EventKind`], and each variant carries exactly one payload struct. Payload
//! structs implement [`Event`], which is what lets [`TypedEventHandler`] hand a
//! subscriber the concrete payload instead of a loosely typed blob.

use crate::types::{AchievementId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Implemented by every payload struct of the closed event set.
///
/// Implementations are generated by the `domain_events!` declaration below;
/// adding an event means adding one line there.
pub trait Event: Clone + Send + Sync + fmt::Debug + 'static {
    /// Routing key of this payload type.
    const KIND: EventKind;

    /// Borrows the payload out of a [`DomainEvent`] if the variant matches.
    fn from_domain(event: &DomainEvent) -> Option<&Self>;

    /// Wraps the payload into its [`DomainEvent`] variant.
    fn into_domain(self) -> DomainEvent;
}

macro_rules! domain_events {
    ($( $(#[$meta:meta])* $variant:ident($payload:ty) => $name:literal ),+ $(,)?) => {
        /// Routing key of a [`DomainEvent`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum EventKind {
            $( $(#[$meta])* $variant ),+
        }

        impl EventKind {
            /// Every event kind, in declaration order.
            pub const ALL: &'static [EventKind] = &[$( EventKind::$variant ),+];

            /// Stable name used in logs.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( EventKind::$variant => $name ),+
                }
            }
        }

        /// A domain occurrence published on the event bus.
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "type", content = "payload")]
        pub enum DomainEvent {
            $( $(#[$meta])* $variant($payload) ),+
        }

        impl DomainEvent {
            pub fn kind(&self) -> EventKind {
                match self {
                    $( DomainEvent::$variant(_) => EventKind::$variant ),+
                }
            }
        }

        $(
            impl Event for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_domain(event: &DomainEvent) -> Option<&Self> {
                    match event {
                        DomainEvent::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }

                fn into_domain(self) -> DomainEvent {
                    DomainEvent::$variant(self)
                }
            }

            impl From<$payload> for DomainEvent {
                fn from(payload: $payload) -> Self {
                    DomainEvent::$variant(payload)
                }
            }
        )+
    };
}

domain_events! {
    /// A user enrolled in the beta program
    BetaEnrolled(BetaEnrolledEvent) => "beta_enrolled",
    /// A new account was created
    UserRegistered(UserRegisteredEvent) => "user_registered",
    /// A user saved their profile
    ProfileUpdated(ProfileUpdatedEvent) => "profile_updated",
    /// A user picked a display badge
    BadgeSelected(BadgeSelectedEvent) => "badge_selected",
    /// An achievement was unlocked for a user (emitted by the engine)
    AchievementUnlocked(AchievementUnlockedEvent) => "achievement_unlocked",
}

impl DomainEvent {
    /// The user this event concerns. Every domain event is user-scoped.
    pub fn user_id(&self) -> &UserId {
        match self {
            DomainEvent::BetaEnrolled(event) => &event.user_id,
            DomainEvent::UserRegistered(event) => &event.user_id,
            DomainEvent::ProfileUpdated(event) => &event.user_id,
            DomainEvent::BadgeSelected(event) => &event.user_id,
            DomainEvent::AchievementUnlocked(event) => &event.user_id,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaEnrolledEvent {
    pub user_id: UserId,
}

impl BetaEnrolledEvent {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub registered_at: DateTime<Utc>,
}

impl UserRegisteredEvent {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            registered_at: Utc::now(),
        }
    }
}

/// Emitted after a profile save. `profile_complete` is computed by the profile
/// service and reports whether every required field is filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdatedEvent {
    pub user_id: UserId,
    pub profile_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeSelectedEvent {
    pub user_id: UserId,
    pub badge_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementUnlockedEvent {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
    pub unlocked_at: DateTime<Utc>,
}

/// Identifier returned on registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Errors that can occur during event handling.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A handler ran and reported failure
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// A typed handler was given an event of another kind
    #[error("Payload mismatch: handler expects {expected}, received {actual}")]
    PayloadMismatch { expected: EventKind, actual: EventKind },
    /// No registration exists for the given id
    #[error("Handler not found: {0}")]
    HandlerNotFound(HandlerId),
}

/// Handler trait for processing events asynchronously.
///
/// Most code registers closures through [`crate::EventSystem::on`] or
/// [`crate::EventSystem::on_typed`]; implement this directly when the handler
/// carries its own state.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Arc<DomainEvent>) -> Result<(), EventError>;

    /// Human-readable name used in logs.
    fn handler_name(&self) -> &str;
}

/// Adapts a closure over the whole [`DomainEvent`] to [`EventHandler`].
pub struct FnEventHandler<F, Fut> {
    handler: F,
    name: String,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnEventHandler<F, Fut>
where
    F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send,
{
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> EventHandler for FnEventHandler<F, Fut>
where
    F: Fn(Arc<DomainEvent>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send,
{
    async fn handle(&self, event: Arc<DomainEvent>) -> Result<(), EventError> {
        (self.handler)(event).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

/// Type-safe wrapper for event handlers.
///
/// Bridges the object-safe [`EventHandler`] trait and a closure that takes
/// the concrete payload `T`. The bus only routes `T::KIND` events here, so the
/// mismatch branch is a guard against misuse of [`EventHandler::handle`].
pub struct TypedEventHandler<T, F, Fut> {
    handler: F,
    name: String,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<T, F, Fut> TypedEventHandler<T, F, Fut>
where
    T: Event,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send,
{
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> EventHandler for TypedEventHandler<T, F, Fut>
where
    T: Event,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), EventError>> + Send,
{
    async fn handle(&self, event: Arc<DomainEvent>) -> Result<(), EventError> {
        let payload = T::from_domain(&event)
            .cloned()
            .ok_or(EventError::PayloadMismatch {
                expected: T::KIND,
                actual: event.kind(),
            })?;
        (self.handler)(payload).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}
