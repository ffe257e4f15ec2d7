pub mod badge_evaluator;
pub mod daily_mission_service;
pub mod referral_verifier;
pub mod streak_tracker;
pub mod weighted_sampler;

pub use badge_evaluator::{BadgeEvaluation, BadgeEvaluator};
pub use daily_mission_service::DailyMissionService;
pub use referral_verifier::ReferralVerifier;
pub use streak_tracker::{next_streak, CheckInOutcome, StreakTracker};
pub use weighted_sampler::{sample_with, WeightedSampler};
