//! SQLite implementation of the ActivityRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid, to_u32, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActivityEvent, EventKind, DAILY_LOGIN_STREAK};
use crate::domain::ports::ActivityRepository;

#[async_trait]
impl ActivityRepository for SqliteRecordStore {
    async fn record_event(&self, event: &ActivityEvent) -> DomainResult<()> {
        let attributes_json = serde_json::to_string(&event.attributes)?;

        sqlx::query("INSERT INTO activity_events (id, user_id, kind, attributes, occurred_at) VALUES (?, ?, ?, ?, ?)")
            .bind(event.id.to_string())
            .bind(event.user_id.to_string())
            .bind(event.kind.as_str())
            .bind(&attributes_json)
            .bind(format_datetime(event.occurred_at))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_events(&self, user_id: Uuid, kind: EventKind, filter: &Map<String, Value>) -> DomainResult<u64> {
        if filter.is_empty() {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM activity_events WHERE user_id = ? AND kind = ?")
                .bind(user_id.to_string())
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
            return Ok(count.max(0) as u64);
        }

        // Attribute filters compare JSON values exactly, so they run on decoded rows.
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, user_id, kind, attributes, occurred_at FROM activity_events WHERE user_id = ? AND kind = ?",
        )
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut count = 0u64;
        for row in rows {
            if ActivityEvent::try_from(row)?.matches(filter) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn has_event_between(&self, user_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM activity_events WHERE user_id = ? AND occurred_at >= ? AND occurred_at <= ?)",
        )
        .bind(user_id.to_string())
        .bind(format_datetime(start))
        .bind(format_datetime(end))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn streak_count(&self, user_id: Uuid, streak_type: &str) -> DomainResult<u32> {
        let count: Option<(i64,)> = if streak_type == DAILY_LOGIN_STREAK {
            sqlx::query_as("SELECT consecutive_days FROM users WHERE id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT count FROM streaks WHERE user_id = ? AND streak_type = ?")
                .bind(user_id.to_string())
                .bind(streak_type)
                .fetch_optional(&self.pool)
                .await?
        };

        count.map_or(Ok(0), |(c,)| to_u32(c, "streak count"))
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    user_id: String,
    kind: String,
    attributes: String,
    occurred_at: String,
}

impl TryFrom<EventRow> for ActivityEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind = EventKind::from_str(&row.kind)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid event kind: {}", row.kind)))?;

        Ok(ActivityEvent {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            kind,
            attributes: serde_json::from_str(&row.attributes)?,
            occurred_at: parse_datetime(&row.occurred_at)?,
        })
    }
}
