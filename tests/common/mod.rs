//! Common test utilities for integration tests
//!
//! Builds engines over a migrated SQLite database so scenarios exercise the
//! real adapters end to end.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use questline::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, SqliteRecordStore, SqliteRewardLedger,
};
use questline::domain::models::{DatabaseConfig, RulesConfig, User};
use questline::domain::ports::UserRepository;
use questline::{GamificationEngine, WeightedSampler};
use tempfile::TempDir;

pub type SqliteEngine = GamificationEngine<SqliteRecordStore, SqliteRewardLedger>;

pub struct Harness {
    pub store: Arc<SqliteRecordStore>,
    pub ledger: Arc<SqliteRewardLedger>,
    pub engine: Arc<SqliteEngine>,
    // Keeps a file-backed database alive for the harness lifetime.
    _dir: Option<TempDir>,
}

impl Harness {
    /// Single-connection in-memory database.
    pub async fn in_memory() -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        Self::build(pool, None)
    }

    /// File database with a multi-connection pool, for concurrent writers.
    pub async fn on_disk() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = DatabaseConfig {
            path: dir.path().join("questline.db").display().to_string(),
            max_connections: 8,
            acquire_timeout_secs: 10,
        };
        let pool = initialize_database(&config).await.expect("file pool");
        Self::build(pool, Some(dir))
    }

    fn build(pool: sqlx::SqlitePool, dir: Option<TempDir>) -> Self {
        let store = Arc::new(SqliteRecordStore::new(pool.clone()));
        let ledger = Arc::new(SqliteRewardLedger::new(pool));
        let engine = GamificationEngine::new(store.clone(), ledger.clone(), RulesConfig::default())
            .with_sampler(WeightedSampler::seeded(42));
        Self {
            store,
            ledger,
            engine: Arc::new(engine),
            _dir: dir,
        }
    }

    pub async fn user(&self, user: User) -> User {
        self.store.create_user(&user).await.expect("create user");
        user
    }

    pub async fn reload(&self, user_id: uuid::Uuid) -> User {
        self.store
            .get_user(user_id)
            .await
            .expect("get user")
            .expect("user exists")
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid instant")
}

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
