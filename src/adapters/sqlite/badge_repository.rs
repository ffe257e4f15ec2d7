//! SQLite implementation of the BadgeRepository.

use async_trait::async_trait;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Badge, BadgeCondition, BadgeRarity, UserBadgeProgress};
use crate::domain::ports::BadgeRepository;

const BADGE_COLUMNS: &str = "id, name, description, category, rarity, condition, is_active, created_at";
const PROGRESS_COLUMNS: &str = "user_id, badge_id, progress, unlocked_at, updated_at";

#[async_trait]
impl BadgeRepository for SqliteRecordStore {
    async fn create_badge(&self, badge: &Badge) -> DomainResult<()> {
        let condition_json = serde_json::to_string(&badge.condition)?;

        sqlx::query(
            r#"INSERT INTO badges (id, name, description, category, rarity, condition, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(badge.id.to_string())
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.category)
        .bind(badge.rarity.as_str())
        .bind(&condition_json)
        .bind(badge.is_active)
        .bind(format_datetime(badge.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_badge(&self, id: Uuid) -> DomainResult<Option<Badge>> {
        let row: Option<BadgeRow> = sqlx::query_as(&format!("SELECT {BADGE_COLUMNS} FROM badges WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Badge::try_from).transpose()
    }

    async fn list_active_badges(&self) -> DomainResult<Vec<Badge>> {
        let rows: Vec<BadgeRow> = sqlx::query_as(&format!(
            "SELECT {BADGE_COLUMNS} FROM badges WHERE is_active = 1 ORDER BY category, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Badge::try_from).collect()
    }

    async fn get_progress(&self, user_id: Uuid, badge_id: Uuid) -> DomainResult<Option<UserBadgeProgress>> {
        let row: Option<ProgressRow> = sqlx::query_as(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_badges WHERE user_id = ? AND badge_id = ?"
        ))
        .bind(user_id.to_string())
        .bind(badge_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserBadgeProgress::try_from).transpose()
    }

    async fn list_progress(&self, user_id: Uuid) -> DomainResult<Vec<UserBadgeProgress>> {
        let rows: Vec<ProgressRow> =
            sqlx::query_as(&format!("SELECT {PROGRESS_COLUMNS} FROM user_badges WHERE user_id = ?"))
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(UserBadgeProgress::try_from).collect()
    }

    async fn insert_progress(&self, progress: &UserBadgeProgress) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id, progress, unlocked_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(progress.user_id.to_string())
        .bind(progress.badge_id.to_string())
        .bind(progress.progress)
        .bind(progress.unlocked_at.map(format_datetime))
        .bind(format_datetime(progress.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_progress(&self, progress: &UserBadgeProgress, expected_progress: f64) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"UPDATE user_badges
               SET progress = ?, unlocked_at = COALESCE(unlocked_at, ?), updated_at = ?
               WHERE user_id = ? AND badge_id = ? AND progress = ?"#,
        )
        .bind(progress.progress)
        .bind(progress.unlocked_at.map(format_datetime))
        .bind(format_datetime(progress.updated_at))
        .bind(progress.user_id.to_string())
        .bind(progress.badge_id.to_string())
        .bind(expected_progress)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct BadgeRow {
    id: String,
    name: String,
    description: String,
    category: String,
    rarity: String,
    condition: String,
    is_active: bool,
    created_at: String,
}

impl TryFrom<BadgeRow> for Badge {
    type Error = DomainError;

    fn try_from(row: BadgeRow) -> Result<Self, Self::Error> {
        let rarity = BadgeRarity::from_str(&row.rarity)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid rarity: {}", row.rarity)))?;
        let condition: BadgeCondition = serde_json::from_str(&row.condition)?;

        Ok(Badge {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            category: row.category,
            rarity,
            condition,
            is_active: row.is_active,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProgressRow {
    user_id: String,
    badge_id: String,
    progress: f64,
    unlocked_at: Option<String>,
    updated_at: String,
}

impl TryFrom<ProgressRow> for UserBadgeProgress {
    type Error = DomainError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        Ok(UserBadgeProgress {
            user_id: parse_uuid(&row.user_id)?,
            badge_id: parse_uuid(&row.badge_id)?,
            progress: row.progress,
            unlocked_at: parse_optional_datetime(row.unlocked_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
