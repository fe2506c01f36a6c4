//! # Core Type Definitions
//!
//! Identifier types shared by every crate in the workspace.
//!
//! - [`UserId`] - opaque identifier of an application user
//! - [`AchievementId`] - the closed set of achievements the catalog knows about

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of an application user.
///
/// The authentication layer owns the format; this crate only compares and
/// prints it.
///
/// ```rust
/// use accolade_event_system::UserId;
///
/// let user = UserId::from("u1");
/// assert_eq!(user.as_str(), "u1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an achievement in the catalog.
///
/// Serialized in `SCREAMING_SNAKE_CASE`, which is also the form persisted in
/// unlock records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementId {
    /// Joined the beta program
    BetaTester,
    /// Created an account
    FirstSteps,
    /// Filled in every profile field
    ProfileComplete,
    /// Picked a display badge for the first time
    Trendsetter,
}

impl AchievementId {
    /// Every achievement id, in catalog order.
    pub const ALL: [AchievementId; 4] = [
        AchievementId::BetaTester,
        AchievementId::FirstSteps,
        AchievementId::ProfileComplete,
        AchievementId::Trendsetter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementId::BetaTester => "BETA_TESTER",
            AchievementId::FirstSteps => "FIRST_STEPS",
            AchievementId::ProfileComplete => "PROFILE_COMPLETE",
            AchievementId::Trendsetter => "TRENDSETTER",
        }
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known achievement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown achievement id: {0}")]
pub struct UnknownAchievement(pub String);

impl FromStr for AchievementId {
    type Err = UnknownAchievement;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AchievementId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownAchievement(s.to_string()))
    }
}
