//! Notifications and reward reasons passed to the reward issuer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BadgeUnlock,
    StreakMilestone,
    AllDailyComplete,
    ReferralVerified,
    MissionCompleted,
    LevelUp,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadgeUnlock => "badge_unlock",
            Self::StreakMilestone => "streak_milestone",
            Self::AllDailyComplete => "all_daily_complete",
            Self::ReferralVerified => "referral_verified",
            Self::MissionCompleted => "mission_completed",
            Self::LevelUp => "level_up",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "badge_unlock" => Some(Self::BadgeUnlock),
            "streak_milestone" => Some(Self::StreakMilestone),
            "all_daily_complete" => Some(Self::AllDailyComplete),
            "referral_verified" => Some(Self::ReferralVerified),
            "mission_completed" => Some(Self::MissionCompleted),
            "level_up" => Some(Self::LevelUp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub payload: Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, kind: NotificationKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            payload,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// Why experience or coins moved. Stored alongside every ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardReason {
    StreakMilestone,
    DailyMissionComplete,
    AllDailyComplete,
    DailyMissionSkip,
    LevelUpBonus,
}

impl RewardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreakMilestone => "streak_milestone",
            Self::DailyMissionComplete => "daily_mission_complete",
            Self::AllDailyComplete => "all_daily_complete",
            Self::DailyMissionSkip => "daily_mission_skip",
            Self::LevelUpBonus => "level_up_bonus",
        }
    }
}

/// Result of a keyed reward grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantOutcome {
    /// The grant was applied by this call.
    Granted,
    /// A grant with the same idempotency key already exists; nothing changed.
    AlreadyGranted,
}

impl GrantOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}
