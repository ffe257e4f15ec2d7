pub mod activity;
pub mod badge;
pub mod config;
pub mod daily_mission;
pub mod notification;
pub mod referral;
pub mod rules;
pub mod user;

pub use activity::{ActivityEvent, EventKind};
pub use badge::{
    scaled_progress, Badge, BadgeCondition, BadgeRarity, BadgeWithProgress, CombinationCondition,
    CountCondition, LevelCondition, StreakCondition, TimeWindowCondition, UserBadgeProgress,
    DAILY_LOGIN_STREAK, FULL_PROGRESS, MAX_CONDITION_DEPTH,
};
pub use config::{Config, DatabaseConfig, LoggingConfig};
pub use daily_mission::{
    AssignmentStatus, DailyMissionAssignment, DailyMissionStats, DailyMissionTemplate,
    MissionReward,
};
pub use notification::{GrantOutcome, Notification, NotificationKind, RewardReason};
pub use referral::{
    MissionParticipation, MissionType, ParticipationStatus, Referral, ReferralSummary,
    ReferrerProgress, VerificationReport, REFERRAL_REWARD_AMOUNT,
};
pub use rules::RulesConfig;
pub use user::{
    apply_experience, level_for_experience, level_up_bonus, normalize_phone, ExperienceChange, User,
    XP_PER_LEVEL,
};
