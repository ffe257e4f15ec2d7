//! User domain model.
//!
//! The engine never creates or deletes users; it reads them to drive streaks,
//! level conditions and referral checks, and mutates only the check-in fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Experience required per level. Level is `total_xp / XP_PER_LEVEL + 1`.
pub const XP_PER_LEVEL: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Digits-only phone number.
    pub phone: String,
    pub level: u32,
    /// Lifetime experience.
    pub experience_points: i64,
    pub coins: i64,
    pub consecutive_days: u32,
    pub last_check_in: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, phone: impl AsRef<str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: normalize_phone(phone.as_ref()),
            level: 1,
            experience_points: 0,
            coins: 0,
            consecutive_days: 0,
            last_check_in: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_coins(mut self, coins: i64) -> Self {
        self.coins = coins;
        self
    }

    pub fn with_experience(mut self, experience_points: i64) -> Self {
        self.experience_points = experience_points;
        self.level = level_for_experience(experience_points);
        self
    }

    pub fn with_streak(mut self, consecutive_days: u32, last_check_in: NaiveDate) -> Self {
        self.consecutive_days = consecutive_days;
        self.last_check_in = Some(last_check_in);
        self
    }
}

/// Level reached with the given lifetime experience.
pub fn level_for_experience(total_xp: i64) -> u32 {
    let level = total_xp.max(0) / XP_PER_LEVEL + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// One-off bonus experience paid on reaching certain levels.
pub fn level_up_bonus(level: u32) -> Option<u32> {
    match level {
        5 => Some(50),
        10 => Some(100),
        15 => Some(200),
        20 => Some(500),
        _ => None,
    }
}

/// Effect of adding experience, including any level-up bonuses it cascades into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceChange {
    pub total_xp: i64,
    pub old_level: u32,
    pub new_level: u32,
    /// `(level, bonus_xp)` for every bonus level crossed.
    pub bonuses: Vec<(u32, u32)>,
}

impl ExperienceChange {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}

pub fn apply_experience(current_total: i64, amount: u32) -> ExperienceChange {
    let old_level = level_for_experience(current_total);
    let mut total_xp = current_total.saturating_add(i64::from(amount));
    let mut bonuses = Vec::new();
    let mut checked_up_to = old_level;

    loop {
        let level = level_for_experience(total_xp);
        if level <= checked_up_to {
            break;
        }
        for crossed in (checked_up_to + 1)..=level {
            if let Some(bonus) = level_up_bonus(crossed) {
                bonuses.push((crossed, bonus));
                total_xp = total_xp.saturating_add(i64::from(bonus));
            }
        }
        checked_up_to = level;
    }

    ExperienceChange {
        total_xp,
        old_level,
        new_level: level_for_experience(total_xp),
        bonuses,
    }
}

/// Strip everything but ASCII digits so "010-1234-5678" and "01012345678" match.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("010-1234-5678"), "01012345678");
        assert_eq!(normalize_phone(" +82 (10) 1234 5678 "), "821012345678");
        assert_eq!(normalize_phone("abc"), "");
    }

    #[test]
    fn test_level_for_experience() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(1_950), 20);
        assert_eq!(level_for_experience(-5), 1);
    }

    #[test]
    fn test_apply_experience_without_level_up() {
        let change = apply_experience(10, 50);
        assert_eq!(change.total_xp, 60);
        assert!(!change.leveled_up());
        assert!(change.bonuses.is_empty());
    }

    #[test]
    fn test_apply_experience_pays_bonus_once() {
        // 390 + 20 crosses into level 5, which pays 50 more.
        let change = apply_experience(390, 20);
        assert_eq!(change.old_level, 4);
        assert_eq!(change.bonuses, vec![(5, 50)]);
        assert_eq!(change.total_xp, 460);
        assert_eq!(change.new_level, 5);
    }

    #[test]
    fn test_apply_experience_cascading_bonus() {
        let change = apply_experience(890, 60);
        assert_eq!(change.bonuses, vec![(10, 100)]);
        assert_eq!(change.total_xp, 1_050);
        assert_eq!(change.new_level, 11);

        // The level 20 bonus pushes the user several levels further.
        let change = apply_experience(1_890, 20);
        assert_eq!(change.bonuses, vec![(20, 500)]);
        assert_eq!(change.total_xp, 2_410);
        assert_eq!(change.new_level, 25);
    }

    #[test]
    fn test_with_experience_sets_level() {
        let user = User::new("Kim", "010").with_experience(450);
        assert_eq!(user.level, 5);
    }
}
