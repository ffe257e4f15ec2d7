//! Badge domain model.
//!
//! A badge unlocks when its declarative [`BadgeCondition`] reaches 100%
//! progress. Conditions form a closed set; `combination` nests other
//! conditions up to [`MAX_CONDITION_DEPTH`] levels deep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::activity::EventKind;

/// Maximum nesting depth of a condition tree. A leaf condition has depth 1.
pub const MAX_CONDITION_DEPTH: usize = 4;

/// Progress value at which a badge counts as unlocked.
pub const FULL_PROGRESS: f64 = 100.0;

/// Streak type backed by the user's consecutive check-in counter.
pub const DAILY_LOGIN_STREAK: &str = "daily_login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BadgeRarity {
    #[default]
    Common,
    Rare,
    Epic,
    Legendary,
}

impl BadgeRarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "common" => Some(Self::Common),
            "rare" => Some(Self::Rare),
            "epic" => Some(Self::Epic),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }
}

/// Count of matching activity events against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCondition {
    pub event: EventKind,
    pub threshold: u32,
    /// Equality predicates on event attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakCondition {
    pub streak_type: String,
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCondition {
    pub threshold: u32,
}

/// Binary condition: any activity inside the inclusive window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowCondition {
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinationCondition {
    pub conditions: Vec<BadgeCondition>,
}

/// Badge unlock condition.
///
/// Stored as `{"type": "<kind>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BadgeCondition {
    Count(CountCondition),
    Streak(StreakCondition),
    Level(LevelCondition),
    TimeBased(TimeWindowCondition),
    Combination(CombinationCondition),
}

impl BadgeCondition {
    pub fn count(event: EventKind, threshold: u32) -> Self {
        Self::Count(CountCondition {
            event,
            threshold,
            filter: Map::new(),
        })
    }

    pub fn count_filtered(event: EventKind, threshold: u32, filter: Map<String, Value>) -> Self {
        Self::Count(CountCondition {
            event,
            threshold,
            filter,
        })
    }

    pub fn streak(streak_type: impl Into<String>, threshold: u32) -> Self {
        Self::Streak(StreakCondition {
            streak_type: streak_type.into(),
            threshold,
        })
    }

    pub fn level(threshold: u32) -> Self {
        Self::Level(LevelCondition { threshold })
    }

    pub fn time_based(time_start: DateTime<Utc>, time_end: DateTime<Utc>) -> Self {
        Self::TimeBased(TimeWindowCondition {
            time_start,
            time_end,
        })
    }

    pub fn combination(conditions: Vec<BadgeCondition>) -> Self {
        Self::Combination(CombinationCondition { conditions })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Streak(_) => "streak",
            Self::Level(_) => "level",
            Self::TimeBased(_) => "time_based",
            Self::Combination(_) => "combination",
        }
    }

    /// Nesting depth of this condition tree.
    pub fn depth(&self) -> usize {
        match self {
            Self::Combination(c) => 1 + c.conditions.iter().map(Self::depth).max().unwrap_or(0),
            _ => 1,
        }
    }

    /// Check the parameters of every node in the tree.
    pub fn validate(&self) -> Result<(), String> {
        self.validate_with_max_depth(MAX_CONDITION_DEPTH)
    }

    /// Like [`validate`](Self::validate) with a configured nesting bound.
    pub fn validate_with_max_depth(&self, max_depth: usize) -> Result<(), String> {
        self.validate_at(1, max_depth)
    }

    fn validate_at(&self, depth: usize, max_depth: usize) -> Result<(), String> {
        if depth > max_depth {
            return Err(format!(
                "condition nesting exceeds maximum depth of {max_depth}"
            ));
        }
        match self {
            Self::Count(c) if c.threshold == 0 => Err("count threshold must be positive".into()),
            Self::Streak(c) if c.threshold == 0 => Err("streak threshold must be positive".into()),
            Self::Streak(c) if c.streak_type.trim().is_empty() => {
                Err("streak type cannot be empty".into())
            }
            Self::Level(c) if c.threshold == 0 => Err("level threshold must be positive".into()),
            Self::TimeBased(c) if c.time_start > c.time_end => {
                Err("time window start must not be after its end".into())
            }
            Self::Combination(c) => {
                if c.conditions.is_empty() {
                    return Err("combination must contain at least one condition".into());
                }
                c.conditions
                    .iter()
                    .try_for_each(|sub| sub.validate_at(depth + 1, max_depth))
            }
            _ => Ok(()),
        }
    }
}

/// Scale `value / threshold` to a percentage capped at 100.
pub fn scaled_progress(value: f64, threshold: u32) -> f64 {
    if threshold == 0 {
        return 0.0;
    }
    (value.max(0.0) / f64::from(threshold) * FULL_PROGRESS).min(FULL_PROGRESS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub rarity: BadgeRarity,
    pub condition: BadgeCondition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Badge {
    pub fn new(name: impl Into<String>, condition: BadgeCondition) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            category: "general".to_string(),
            rarity: BadgeRarity::default(),
            condition,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_rarity(mut self, rarity: BadgeRarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("badge name cannot be empty".to_string());
        }
        self.condition.validate()
    }
}

/// Persisted progress of one user towards one badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadgeProgress {
    pub user_id: Uuid,
    pub badge_id: Uuid,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    /// Set once, the first time progress reached 100.
    pub unlocked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserBadgeProgress {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some() || self.progress >= FULL_PROGRESS
    }
}

/// A badge joined with the user's stored progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeWithProgress {
    pub badge: Badge,
    pub progress: f64,
    pub is_unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}
