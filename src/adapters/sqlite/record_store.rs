//! SQLite record store.
//!
//! One handle implements every repository port; the per-port impls live in
//! the sibling `*_repository` modules.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::format_datetime;
use crate::domain::errors::DomainResult;

#[derive(Clone)]
pub struct SqliteRecordStore {
    pub(super) pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set a named (non check-in) streak counter.
    pub async fn set_streak(&self, user_id: Uuid, streak_type: &str, count: u32) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO streaks (user_id, streak_type, count, updated_at) VALUES (?, ?, ?, ?)
               ON CONFLICT (user_id, streak_type) DO UPDATE SET count = excluded.count, updated_at = excluded.updated_at"#,
        )
        .bind(user_id.to_string())
        .bind(streak_type)
        .bind(i64::from(count))
        .bind(format_datetime(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
