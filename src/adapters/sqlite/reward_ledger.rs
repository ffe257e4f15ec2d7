//! SQLite reward ledger.
//!
//! Every grant is a `reward_ledger` row; the unique idempotency key makes a
//! repeated grant a no-op. Experience grants also recompute the level and pay
//! the one-off level bonuses in the same transaction.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{apply_experience, GrantOutcome, Notification, NotificationKind, RewardReason};
use crate::domain::ports::RewardIssuer;

#[derive(Clone)]
pub struct SqliteRewardLedger {
    pool: SqlitePool,
}

impl SqliteRewardLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Notifications for a user, oldest first.
    pub async fn list_notifications(&self, user_id: Uuid) -> DomainResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, payload, is_read, created_at FROM notifications WHERE user_id = ? ORDER BY rowid",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    /// Sum of `(xp, coins)` movements recorded for a user.
    pub async fn ledger_totals(&self, user_id: Uuid) -> DomainResult<(i64, i64)> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(xp_delta), 0), COALESCE(SUM(coin_delta), 0) FROM reward_ledger WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }
}

/// Insert a ledger row. Returns `false` when the key was already used.
async fn insert_entry(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: Uuid,
    key: Option<&str>,
    reason: RewardReason,
    xp_delta: i64,
    coin_delta: i64,
) -> DomainResult<bool> {
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO reward_ledger (id, user_id, idempotency_key, reason, xp_delta, coin_delta, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id.to_string())
    .bind(key)
    .bind(reason.as_str())
    .bind(xp_delta)
    .bind(coin_delta)
    .bind(format_datetime(Utc::now()))
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn insert_notification(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: Uuid,
    kind: NotificationKind,
    payload: &Value,
) -> DomainResult<()> {
    sqlx::query("INSERT INTO notifications (id, user_id, kind, payload, is_read, created_at) VALUES (?, ?, ?, ?, 0, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .bind(serde_json::to_string(payload)?)
        .bind(format_datetime(Utc::now()))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn user_exists(tx: &mut Transaction<'_, Sqlite>, user_id: Uuid) -> DomainResult<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id.to_string())
        .fetch_one(&mut **tx)
        .await?;
    Ok(exists)
}

#[async_trait]
impl RewardIssuer for SqliteRewardLedger {
    async fn grant_experience(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome> {
        let mut tx = self.pool.begin().await?;

        // Writing the keyed row first takes the write lock before anything is read.
        if !insert_entry(&mut tx, user_id, Some(idempotency_key), reason, i64::from(amount), 0).await? {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        if !user_exists(&mut tx, user_id).await? {
            return Err(DomainError::UserNotFound(user_id));
        }

        let (current,): (i64,) = sqlx::query_as("SELECT experience_points FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let change = apply_experience(current, amount);

        for (level, bonus) in &change.bonuses {
            let key = format!("level_bonus:{user_id}:{level}");
            insert_entry(&mut tx, user_id, Some(&key), RewardReason::LevelUpBonus, i64::from(*bonus), 0).await?;
        }

        sqlx::query("UPDATE users SET experience_points = ?, level = ? WHERE id = ?")
            .bind(change.total_xp)
            .bind(i64::from(change.new_level))
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        if change.leveled_up() {
            let payload = json!({ "newLevel": change.new_level });
            insert_notification(&mut tx, user_id, NotificationKind::LevelUp, &payload).await?;
        }

        tx.commit().await?;
        Ok(GrantOutcome::Granted)
    }

    async fn grant_coins(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome> {
        let mut tx = self.pool.begin().await?;

        if !insert_entry(&mut tx, user_id, Some(idempotency_key), reason, 0, i64::from(amount)).await? {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        if !user_exists(&mut tx, user_id).await? {
            return Err(DomainError::UserNotFound(user_id));
        }

        sqlx::query("UPDATE users SET coins = coins + ? WHERE id = ?")
            .bind(i64::from(amount))
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(GrantOutcome::Granted)
    }

    async fn debit_coins(&self, user_id: Uuid, amount: u32, reason: RewardReason) -> DomainResult<i64> {
        let cost = i64::from(amount);
        let mut tx = self.pool.begin().await?;

        let balance: Option<(i64,)> =
            sqlx::query_as("UPDATE users SET coins = coins - ? WHERE id = ? AND coins >= ? RETURNING coins")
                .bind(cost)
                .bind(user_id.to_string())
                .bind(cost)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((balance,)) = balance else {
            if !user_exists(&mut tx, user_id).await? {
                return Err(DomainError::UserNotFound(user_id));
            }
            return Err(DomainError::ValidationFailed(format!(
                "insufficient coins to pay {cost}"
            )));
        };

        insert_entry(&mut tx, user_id, None, reason, 0, -cost).await?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn create_notification(&self, user_id: Uuid, kind: NotificationKind, payload: Value) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_notification(&mut tx, user_id, kind, &payload).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    kind: String,
    payload: String,
    is_read: bool,
    created_at: String,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = NotificationKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid notification kind: {}", row.kind)))?;

        Ok(Notification {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            kind,
            payload: serde_json::from_str(&row.payload)?,
            is_read: row.is_read,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteRecordStore};
    use crate::domain::models::User;
    use crate::domain::ports::UserRepository;

    async fn setup(user: &User) -> (SqliteRecordStore, SqliteRewardLedger) {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = SqliteRecordStore::new(pool.clone());
        store.create_user(user).await.unwrap();
        (store, SqliteRewardLedger::new(pool))
    }

    #[tokio::test]
    async fn test_keyed_grant_applies_once() {
        let user = User::new("Moon", "010");
        let (store, ledger) = setup(&user).await;

        let first = ledger.grant_coins(user.id, 15, RewardReason::DailyMissionComplete, "k").await.unwrap();
        let again = ledger.grant_coins(user.id, 15, RewardReason::DailyMissionComplete, "k").await.unwrap();

        assert_eq!(first, GrantOutcome::Granted);
        assert_eq!(again, GrantOutcome::AlreadyGranted);
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().coins, 15);
        assert_eq!(ledger.ledger_totals(user.id).await.unwrap(), (0, 15));
    }

    #[tokio::test]
    async fn test_level_up_pays_bonus_and_notifies() {
        let user = User::new("Moon", "010").with_experience(390);
        let (store, ledger) = setup(&user).await;

        ledger.grant_experience(user.id, 20, RewardReason::StreakMilestone, "xp").await.unwrap();

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.experience_points, 460);
        assert_eq!(stored.level, 5);
        assert_eq!(ledger.ledger_totals(user.id).await.unwrap(), (70, 0));

        let notifications = ledger.list_notifications(user.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::LevelUp);
        assert_eq!(notifications[0].payload, json!({"newLevel": 5}));
    }

    #[tokio::test]
    async fn test_debit_guards_balance() {
        let user = User::new("Moon", "010").with_coins(120);
        let (store, ledger) = setup(&user).await;

        assert_eq!(ledger.debit_coins(user.id, 100, RewardReason::DailyMissionSkip).await.unwrap(), 20);
        let err = ledger.debit_coins(user.id, 100, RewardReason::DailyMissionSkip).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().coins, 20);

        let err = ledger.debit_coins(Uuid::new_v4(), 1, RewardReason::DailyMissionSkip).await.unwrap_err();
        assert!(matches!(err, DomainError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_grant_to_missing_user() {
        let user = User::new("Moon", "010");
        let (_, ledger) = setup(&user).await;
        let err = ledger
            .grant_experience(Uuid::new_v4(), 5, RewardReason::StreakMilestone, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::UserNotFound(_)));
    }
}
