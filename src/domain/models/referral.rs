//! Referral and mission participation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::user::normalize_phone;

/// Cash payback owed per verified referral, in won.
pub const REFERRAL_REWARD_AMOUNT: i64 = 50_000;

/// A referrer's claim that someone will sign up with the given phone.
///
/// `pending --verify--> verified`; `reward_paid` is driven externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referee_name: String,
    pub referee_phone: String,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub reward_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn new(referrer_id: Uuid, referee_name: impl Into<String>, referee_phone: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id,
            referee_name: referee_name.into(),
            referee_phone: normalize_phone(referee_phone),
            is_verified: false,
            verified_at: None,
            reward_paid: false,
            created_at: Utc::now(),
        }
    }
}

/// Per-referrer state after a verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerProgress {
    pub referrer_id: Uuid,
    pub verified_count: u64,
    /// Referrals of this referrer flipped by this pass.
    pub newly_verified: usize,
    /// True when this pass moved the referral mission to completed.
    pub mission_completed: bool,
}

/// Outcome of verifying one referee phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VerificationReport {
    pub phone: String,
    /// Rows flipped to verified by this call.
    pub newly_verified: usize,
    pub referrers: Vec<ReferrerProgress>,
}

impl VerificationReport {
    /// Nothing was verified and no mission completed.
    pub fn is_noop(&self) -> bool {
        self.newly_verified == 0 && !self.referrers.iter().any(|r| r.mission_completed)
    }

    /// Verified count for a specific referrer touched by this pass.
    pub fn verified_count_for(&self, referrer_id: Uuid) -> Option<u64> {
        self.referrers
            .iter()
            .find(|r| r.referrer_id == referrer_id)
            .map(|r| r.verified_count)
    }
}

/// Aggregated referral numbers for one referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReferralSummary {
    pub total_referrals: u64,
    pub verified_referrals: u64,
    pub pending_reward_amount: i64,
    pub paid_reward_amount: i64,
}

impl ReferralSummary {
    pub fn from_referrals(referrals: &[Referral]) -> Self {
        let verified = referrals.iter().filter(|r| r.is_verified).count();
        let pending = referrals
            .iter()
            .filter(|r| r.is_verified && !r.reward_paid)
            .count();
        let paid = referrals.iter().filter(|r| r.reward_paid).count();
        Self {
            total_referrals: referrals.len() as u64,
            verified_referrals: verified as u64,
            pending_reward_amount: pending as i64 * REFERRAL_REWARD_AMOUNT,
            paid_reward_amount: paid as i64 * REFERRAL_REWARD_AMOUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Challenge,
    Sns,
    Review,
    Referral,
    Attendance,
}

impl MissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::Sns => "sns",
            Self::Review => "review",
            Self::Referral => "referral",
            Self::Attendance => "attendance",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "challenge" => Some(Self::Challenge),
            "sns" => Some(Self::Sns),
            "review" => Some(Self::Review),
            "referral" => Some(Self::Referral),
            "attendance" => Some(Self::Attendance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Verified,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Verified => "verified",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }

    /// Pending or in progress; completion is one-way.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// A user's participation in a (non-daily) mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionParticipation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mission_type: MissionType,
    pub status: ParticipationStatus,
    pub proof_data: Value,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MissionParticipation {
    pub fn new(user_id: Uuid, mission_type: MissionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            mission_type,
            status: ParticipationStatus::Pending,
            proof_data: Value::Null,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ParticipationStatus) -> Self {
        self.status = status;
        self
    }
}
