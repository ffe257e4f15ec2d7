//! Questline - gamification rules engine
//!
//! Questline decides when users earn rewards: badge progress derived from
//! declarative conditions, daily check-in streaks with milestone bonuses,
//! weighted daily mission assignment, and referral verification that
//! completes a referral mission once enough invitees register.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain Layer** (`domain`): models, errors and the storage/reward ports
//! - **Service Layer** (`services`): streaks, badge evaluation, daily missions, referrals
//! - **Application Layer** (`application`): [`GamificationEngine`] composing the user-action flows
//! - **Adapters** (`adapters`): SQLite and in-memory implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use questline::adapters::memory::InMemoryStore;
//! use questline::{GamificationEngine, RulesConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let engine = GamificationEngine::new(store.clone(), store, RulesConfig::default());
//!     let user = engine.register_user("Kim", "010-1234-5678").await?;
//!     let outcome = engine.check_in(user.id).await?;
//!     println!("streak: {}", outcome.result.consecutive_days);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{ActionOutcome, GamificationEngine};
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    ActivityEvent, Badge, BadgeCondition, Config, DailyMissionAssignment, DailyMissionTemplate,
    DatabaseConfig, EventKind, LoggingConfig, Referral, RulesConfig, User,
};
pub use domain::ports::{RecordStore, RewardIssuer};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BadgeEvaluation, CheckInOutcome, WeightedSampler};
