//! The built-in achievement catalog.
//!
//! Adding an achievement means adding a variant to [`AchievementId`], one
//! definition here and one metadata entry in [`builtin_metadata`].

use crate::error::EngineError;
use crate::registry::{AchievementDefinition, AchievementMeta, Unlocker};
use accolade_event_system::{
    AchievementId, BadgeSelectedEvent, BetaEnrolledEvent, DomainEvent, Event, EventError,
    EventKind, ProfileUpdatedEvent, UserRegisteredEvent,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Borrows the payload of type `T` out of `event`.
fn payload<T: Event>(event: &DomainEvent) -> Result<&T, EngineError> {
    T::from_domain(event).ok_or_else(|| {
        EngineError::Event(EventError::PayloadMismatch {
            expected: T::KIND,
            actual: event.kind(),
        })
    })
}

/// Unlocked on beta enrollment.
#[derive(Debug, Default)]
pub struct BetaTester;

#[async_trait]
impl AchievementDefinition for BetaTester {
    fn id(&self) -> AchievementId {
        AchievementId::BetaTester
    }

    fn listens_to(&self) -> &'static [EventKind] {
        &[EventKind::BetaEnrolled]
    }

    async fn handle(&self, event: &DomainEvent, unlocker: &dyn Unlocker) -> Result<(), EngineError> {
        let event = payload::<BetaEnrolledEvent>(event)?;
        unlocker.unlock(&event.user_id, self.id(), None).await?;
        Ok(())
    }
}

/// Unlocked when an account is created.
#[derive(Debug, Default)]
pub struct FirstSteps;

#[async_trait]
impl AchievementDefinition for FirstSteps {
    fn id(&self) -> AchievementId {
        AchievementId::FirstSteps
    }

    fn listens_to(&self) -> &'static [EventKind] {
        &[EventKind::UserRegistered]
    }

    async fn handle(&self, event: &DomainEvent, unlocker: &dyn Unlocker) -> Result<(), EngineError> {
        let event = payload::<UserRegisteredEvent>(event)?;
        let data = json!({ "registered_at": event.registered_at });
        unlocker.unlock(&event.user_id, self.id(), Some(data)).await?;
        Ok(())
    }
}

/// Unlocked by the first profile save that leaves the profile complete.
#[derive(Debug, Default)]
pub struct ProfileComplete;

#[async_trait]
impl AchievementDefinition for ProfileComplete {
    fn id(&self) -> AchievementId {
        AchievementId::ProfileComplete
    }

    fn listens_to(&self) -> &'static [EventKind] {
        &[EventKind::ProfileUpdated]
    }

    async fn handle(&self, event: &DomainEvent, unlocker: &dyn Unlocker) -> Result<(), EngineError> {
        let event = payload::<ProfileUpdatedEvent>(event)?;
        if !event.profile_complete {
            debug!("Profile of {} still incomplete", event.user_id);
            return Ok(());
        }

        unlocker.unlock(&event.user_id, self.id(), None).await?;
        Ok(())
    }
}

/// Unlocked by the first badge selection.
#[derive(Debug, Default)]
pub struct Trendsetter;

#[async_trait]
impl AchievementDefinition for Trendsetter {
    fn id(&self) -> AchievementId {
        AchievementId::Trendsetter
    }

    fn listens_to(&self) -> &'static [EventKind] {
        &[EventKind::BadgeSelected]
    }

    async fn handle(&self, event: &DomainEvent, unlocker: &dyn Unlocker) -> Result<(), EngineError> {
        let event = payload::<BadgeSelectedEvent>(event)?;
        let data = json!({ "badge_id": event.badge_id });
        unlocker.unlock(&event.user_id, self.id(), Some(data)).await?;
        Ok(())
    }
}

pub fn builtin_definitions() -> Vec<Arc<dyn AchievementDefinition>> {
    vec![
        Arc::new(BetaTester),
        Arc::new(FirstSteps),
        Arc::new(ProfileComplete),
        Arc::new(Trendsetter),
    ]
}

pub fn builtin_metadata() -> Vec<AchievementMeta> {
    vec![
        AchievementMeta::new(
            AchievementId::BetaTester,
            "Beta Tester",
            "Joined the beta program",
        )
        .with_icon("flask")
        .with_badge("beta-tester"),
        AchievementMeta::new(
            AchievementId::FirstSteps,
            "First Steps",
            "Created an account",
        )
        .with_icon("footprints"),
        AchievementMeta::new(
            AchievementId::ProfileComplete,
            "All About Me",
            "Filled in every profile field",
        )
        .with_icon("id-card"),
        AchievementMeta::new(
            AchievementId::Trendsetter,
            "Trendsetter",
            "Picked a display badge",
        )
        .with_icon("sparkles"),
    ]
}
