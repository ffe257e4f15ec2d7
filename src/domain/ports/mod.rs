//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - Record store repositories: users, badges, daily missions, referrals,
//!   mission participations and activity events
//! - RewardIssuer: experience/coin ledger and notifications
//!
//! These traits define the contracts that allow the engine to be independent
//! of specific storage implementations.

pub mod activity_repository;
pub mod badge_repository;
pub mod daily_mission_repository;
pub mod participation_repository;
pub mod referral_repository;
pub mod reward_issuer;
pub mod user_repository;

pub use activity_repository::ActivityRepository;
pub use badge_repository::BadgeRepository;
pub use daily_mission_repository::{AssignmentTransition, DailyMissionRepository};
pub use participation_repository::ParticipationRepository;
pub use referral_repository::ReferralRepository;
pub use reward_issuer::RewardIssuer;
pub use user_repository::UserRepository;

/// The full record store: every repository the engine reads or writes.
pub trait RecordStore:
    UserRepository
    + BadgeRepository
    + DailyMissionRepository
    + ReferralRepository
    + ParticipationRepository
    + ActivityRepository
{
}

impl<T> RecordStore for T where
    T: UserRepository
        + BadgeRepository
        + DailyMissionRepository
        + ReferralRepository
        + ParticipationRepository
        + ActivityRepository
{
}
