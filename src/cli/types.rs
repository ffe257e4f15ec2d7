//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use uuid::Uuid;

use super::commands::{
    activity::ActivityArgs, badge::BadgeArgs, init::InitArgs, mission::MissionArgs,
    referral::ReferralArgs, user::UserArgs,
};

#[derive(Parser, Debug)]
#[command(name = "questline")]
#[command(about = "Questline - gamification rules engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize questline configuration and database
    Init(InitArgs),

    /// Register and inspect users
    User(UserArgs),

    /// Record today's check-in for a user
    Checkin {
        /// User ID
        user_id: Uuid,
    },

    /// Record an activity event and re-evaluate badges
    Activity(ActivityArgs),

    /// Daily mission commands
    Mission(MissionArgs),

    /// Badge commands
    Badge(BadgeArgs),

    /// Referral commands
    Referral(ReferralArgs),
}
