//! SQLite implementation of the UserRepository.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_uuid, to_u32, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::User;
use crate::domain::ports::UserRepository;

#[async_trait]
impl UserRepository for SqliteRecordStore {
    async fn create_user(&self, user: &User) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO users (id, name, phone, level, experience_points, coins, consecutive_days, last_check_in, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.phone)
        .bind(i64::from(user.level))
        .bind(user.experience_points)
        .bind(user.coins)
        .bind(i64::from(user.consecutive_days))
        .bind(user.last_check_in.map(|d| d.to_string()))
        .bind(format_datetime(user.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, phone, level, experience_points, coins, consecutive_days, last_check_in, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn update_check_in(
        &self,
        id: Uuid,
        expected_last_check_in: Option<NaiveDate>,
        consecutive_days: u32,
        check_in_date: NaiveDate,
    ) -> DomainResult<bool> {
        // `IS` matches NULL against NULL for a first check-in.
        let result = sqlx::query(
            "UPDATE users SET consecutive_days = ?, last_check_in = ? WHERE id = ? AND last_check_in IS ?",
        )
        .bind(i64::from(consecutive_days))
        .bind(check_in_date.to_string())
        .bind(id.to_string())
        .bind(expected_last_check_in.map(|d| d.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    phone: String,
    level: i64,
    experience_points: i64,
    coins: i64,
    consecutive_days: i64,
    last_check_in: Option<String>,
    created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            name: row.name,
            phone: row.phone,
            level: to_u32(row.level, "level")?,
            experience_points: row.experience_points,
            coins: row.coins,
            consecutive_days: to_u32(row.consecutive_days, "consecutive_days")?,
            last_check_in: row.last_check_in.as_deref().map(parse_date).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
