//! CLI command implementations.

pub mod activity;
pub mod badge;
pub mod checkin;
pub mod init;
pub mod mission;
pub mod referral;
pub mod user;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::sqlite::{initialize_database, SqliteRecordStore, SqliteRewardLedger};
use crate::application::GamificationEngine;
use crate::domain::models::Config;
use crate::services::BadgeEvaluation;

pub type SqliteEngine = GamificationEngine<SqliteRecordStore, SqliteRewardLedger>;

/// Handles shared by the commands of one invocation.
pub struct CliContext {
    pub store: Arc<SqliteRecordStore>,
    pub ledger: Arc<SqliteRewardLedger>,
    pub engine: SqliteEngine,
}

impl CliContext {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .context("Failed to initialize database. Run 'questline init' first.")?;

        let store = Arc::new(SqliteRecordStore::new(pool.clone()));
        let ledger = Arc::new(SqliteRewardLedger::new(pool));
        let engine = GamificationEngine::new(store.clone(), ledger.clone(), config.rules.clone());
        Ok(Self { store, ledger, engine })
    }
}

/// Badge unlocked as a side effect of a command.
#[derive(Debug, Serialize)]
pub struct UnlockedBadge {
    pub badge_id: Uuid,
}

pub(crate) fn unlocked(evaluations: &[BadgeEvaluation]) -> Vec<UnlockedBadge> {
    evaluations
        .iter()
        .filter(|e| e.newly_unlocked)
        .map(|e| UnlockedBadge { badge_id: e.badge_id })
        .collect()
}

pub(crate) fn unlocked_lines(badges: &[UnlockedBadge]) -> Vec<String> {
    badges
        .iter()
        .map(|b| format!("Badge unlocked: {}", b.badge_id))
        .collect()
}
