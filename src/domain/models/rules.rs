//! Tunable constants of the rules engine.

use serde::{Deserialize, Serialize};

use super::badge::MAX_CONDITION_DEPTH;

pub const DEFAULT_DAILY_MISSION_COUNT: usize = 5;
pub const DEFAULT_STREAK_MILESTONES: [u32; 4] = [7, 14, 30, 100];
pub const DEFAULT_MILESTONE_MULTIPLIER: u32 = 10;
pub const DEFAULT_REFERRAL_THRESHOLD: u64 = 5;
pub const DEFAULT_ALL_COMPLETE_BONUS_XP: u32 = 100;
pub const DEFAULT_SKIP_COST: u32 = 100;

/// Engine tunables. Defaults reproduce the production constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RulesConfig {
    /// Missions drawn per user per day.
    #[serde(default = "default_daily_mission_count")]
    pub daily_mission_count: usize,

    /// Consecutive-day counts that pay a bonus.
    #[serde(default = "default_streak_milestones")]
    pub streak_milestones: Vec<u32>,

    /// Bonus XP = milestone × multiplier.
    #[serde(default = "default_milestone_multiplier")]
    pub milestone_multiplier: u32,

    /// Verified referrals needed to complete the referral mission.
    #[serde(default = "default_referral_threshold")]
    pub referral_threshold: u64,

    /// XP granted once per day when every assignment is completed.
    #[serde(default = "default_all_complete_bonus_xp")]
    pub all_complete_bonus_xp: u32,

    /// Coins debited to skip a daily mission.
    #[serde(default = "default_skip_cost")]
    pub skip_cost: u32,

    /// Maximum nesting of badge conditions.
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: usize,
}

const fn default_daily_mission_count() -> usize {
    DEFAULT_DAILY_MISSION_COUNT
}

fn default_streak_milestones() -> Vec<u32> {
    DEFAULT_STREAK_MILESTONES.to_vec()
}

const fn default_milestone_multiplier() -> u32 {
    DEFAULT_MILESTONE_MULTIPLIER
}

const fn default_referral_threshold() -> u64 {
    DEFAULT_REFERRAL_THRESHOLD
}

const fn default_all_complete_bonus_xp() -> u32 {
    DEFAULT_ALL_COMPLETE_BONUS_XP
}

const fn default_skip_cost() -> u32 {
    DEFAULT_SKIP_COST
}

const fn default_max_condition_depth() -> usize {
    MAX_CONDITION_DEPTH
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            daily_mission_count: default_daily_mission_count(),
            streak_milestones: default_streak_milestones(),
            milestone_multiplier: default_milestone_multiplier(),
            referral_threshold: default_referral_threshold(),
            all_complete_bonus_xp: default_all_complete_bonus_xp(),
            skip_cost: default_skip_cost(),
            max_condition_depth: default_max_condition_depth(),
        }
    }
}

impl RulesConfig {
    /// Bonus XP for reaching `consecutive_days`, if it is a milestone.
    pub fn milestone_bonus(&self, consecutive_days: u32) -> Option<u32> {
        self.streak_milestones
            .contains(&consecutive_days)
            .then(|| consecutive_days.saturating_mul(self.milestone_multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_bonus() {
        let rules = RulesConfig::default();
        assert_eq!(rules.milestone_bonus(7), Some(70));
        assert_eq!(rules.milestone_bonus(14), Some(140));
        assert_eq!(rules.milestone_bonus(30), Some(300));
        assert_eq!(rules.milestone_bonus(100), Some(1_000));
        assert_eq!(rules.milestone_bonus(8), None);
        assert_eq!(rules.milestone_bonus(0), None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let rules: RulesConfig = serde_yaml::from_str("referral_threshold: 3\n").unwrap();
        assert_eq!(rules.referral_threshold, 3);
        assert_eq!(rules.daily_mission_count, 5);
        assert_eq!(rules.streak_milestones, vec![7, 14, 30, 100]);
    }
}
