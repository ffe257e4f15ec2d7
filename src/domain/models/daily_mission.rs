//! Daily mission templates and per-day assignments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A mission that can be drawn into a user's daily set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMissionTemplate {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Relative sampling weight. Non-positive values are treated as 1.
    pub weight: f64,
    pub xp_reward: u32,
    pub coin_reward: u32,
    pub is_active: bool,
}

impl DailyMissionTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            weight: 1.0,
            xp_reward: 0,
            coin_reward: 0,
            is_active: true,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rewards(mut self, xp_reward: u32, coin_reward: u32) -> Self {
        self.xp_reward = xp_reward;
        self.coin_reward = coin_reward;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Weight used for sampling.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() && self.weight > 0.0 {
            self.weight
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One template assigned to one user for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMissionAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub template_id: Uuid,
    pub assigned_date: NaiveDate,
    pub status: AssignmentStatus,
    /// Free-form progress or proof payload.
    pub progress: Value,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DailyMissionAssignment {
    pub fn new(user_id: Uuid, template_id: Uuid, assigned_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            template_id,
            assigned_date,
            status: AssignmentStatus::Pending,
            progress: Value::Object(serde_json::Map::new()),
            completed_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Rewards granted for completing one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MissionReward {
    pub xp_reward: u32,
    pub coin_reward: u32,
    /// Set when this completion finished the whole day's set.
    pub all_complete_bonus: Option<u32>,
}

/// Lifetime daily mission statistics for a user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DailyMissionStats {
    pub total_assigned: u64,
    pub total_completed: u64,
    /// Percentage of assigned missions that were completed.
    pub completion_rate: f64,
}

impl DailyMissionStats {
    pub fn from_counts(total_assigned: u64, total_completed: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let completion_rate = if total_assigned == 0 {
            0.0
        } else {
            total_completed as f64 / total_assigned as f64 * 100.0
        };
        Self {
            total_assigned,
            total_completed,
            completion_rate,
        }
    }
}
