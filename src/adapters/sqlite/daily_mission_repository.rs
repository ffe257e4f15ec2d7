//! SQLite implementation of the DailyMissionRepository.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_optional_datetime, parse_uuid, to_u32, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssignmentStatus, DailyMissionAssignment, DailyMissionTemplate};
use crate::domain::ports::{AssignmentTransition, DailyMissionRepository};

const TEMPLATE_COLUMNS: &str = "id, title, description, weight, xp_reward, coin_reward, is_active";
const ASSIGNMENT_COLUMNS: &str = "id, user_id, template_id, assigned_date, status, progress, completed_at, created_at";

#[async_trait]
impl DailyMissionRepository for SqliteRecordStore {
    async fn create_template(&self, template: &DailyMissionTemplate) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO daily_mission_templates (id, title, description, weight, xp_reward, coin_reward, is_active)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(template.id.to_string())
        .bind(&template.title)
        .bind(&template.description)
        .bind(template.weight)
        .bind(i64::from(template.xp_reward))
        .bind(i64::from(template.coin_reward))
        .bind(template.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> DomainResult<Option<DailyMissionTemplate>> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM daily_mission_templates WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(DailyMissionTemplate::try_from).transpose()
    }

    async fn list_active_templates(&self) -> DomainResult<Vec<DailyMissionTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM daily_mission_templates WHERE is_active = 1 ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyMissionTemplate::try_from).collect()
    }

    async fn list_assignments(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM daily_missions WHERE user_id = ? AND assigned_date = ? ORDER BY rowid"
        ))
        .bind(user_id.to_string())
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyMissionAssignment::try_from).collect()
    }

    async fn insert_assignments(&self, assignments: &[DailyMissionAssignment]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        // The batch marker is written first: a second batch for the same day
        // fails here with a unique violation and the transaction rolls back.
        let mut days: Vec<(Uuid, NaiveDate)> = assignments.iter().map(|a| (a.user_id, a.assigned_date)).collect();
        days.dedup();
        for (user_id, date) in days {
            sqlx::query("INSERT INTO daily_mission_batches (user_id, assigned_date, created_at) VALUES (?, ?, ?)")
                .bind(user_id.to_string())
                .bind(date.to_string())
                .bind(format_datetime(Utc::now()))
                .execute(&mut *tx)
                .await?;
        }

        for assignment in assignments {
            let progress_json = serde_json::to_string(&assignment.progress)?;
            sqlx::query(
                r#"INSERT INTO daily_missions (id, user_id, template_id, assigned_date, status, progress, completed_at, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(assignment.id.to_string())
            .bind(assignment.user_id.to_string())
            .bind(assignment.template_id.to_string())
            .bind(assignment.assigned_date.to_string())
            .bind(assignment.status.as_str())
            .bind(&progress_json)
            .bind(assignment.completed_at.map(format_datetime))
            .bind(format_datetime(assignment.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> DomainResult<Option<DailyMissionAssignment>> {
        let row: Option<AssignmentRow> =
            sqlx::query_as(&format!("SELECT {ASSIGNMENT_COLUMNS} FROM daily_missions WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(DailyMissionAssignment::try_from).transpose()
    }

    async fn transition_assignment(&self, transition: &AssignmentTransition) -> DomainResult<bool> {
        let progress_json = transition.progress.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"UPDATE daily_missions
               SET status = ?, progress = COALESCE(?, progress), completed_at = COALESCE(?, completed_at)
               WHERE id = ? AND user_id = ? AND status = ?"#,
        )
        .bind(transition.to.as_str())
        .bind(progress_json)
        .bind(transition.completed_at.map(format_datetime))
        .bind(transition.assignment_id.to_string())
        .bind(transition.user_id.to_string())
        .bind(transition.from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn assignment_counts(&self, user_id: Uuid) -> DomainResult<(u64, u64)> {
        let (assigned, completed): (i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
               FROM daily_missions WHERE user_id = ?"#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok((assigned.max(0) as u64, completed.max(0) as u64))
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: String,
    title: String,
    description: String,
    weight: f64,
    xp_reward: i64,
    coin_reward: i64,
    is_active: bool,
}

impl TryFrom<TemplateRow> for DailyMissionTemplate {
    type Error = DomainError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(DailyMissionTemplate {
            id: parse_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            weight: row.weight,
            xp_reward: to_u32(row.xp_reward, "xp_reward")?,
            coin_reward: to_u32(row.coin_reward, "coin_reward")?,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    user_id: String,
    template_id: String,
    assigned_date: String,
    status: String,
    progress: String,
    completed_at: Option<String>,
    created_at: String,
}

impl TryFrom<AssignmentRow> for DailyMissionAssignment {
    type Error = DomainError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let status = AssignmentStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(DailyMissionAssignment {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            template_id: parse_uuid(&row.template_id)?,
            assigned_date: parse_date(&row.assigned_date)?,
            status,
            progress: serde_json::from_str(&row.progress)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::User;
    use crate::domain::ports::UserRepository;
    use serde_json::json;

    async fn setup() -> (SqliteRecordStore, User, Vec<DailyMissionTemplate>) {
        let store = SqliteRecordStore::new(create_migrated_test_pool().await.unwrap());
        let user = User::new("Shin", "010");
        store.create_user(&user).await.unwrap();
        let mut templates = Vec::new();
        for i in 0..3 {
            let t = DailyMissionTemplate::new(format!("T{i}")).with_weight(2.0).with_rewards(10, 1);
            store.create_template(&t).await.unwrap();
            templates.push(t);
        }
        (store, user, templates)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()
    }

    #[tokio::test]
    async fn test_templates_keep_insertion_order() {
        let (store, _, templates) = setup().await;
        store.create_template(&DailyMissionTemplate::new("Off").inactive()).await.unwrap();

        let active = store.list_active_templates().await.unwrap();
        let ids: Vec<_> = active.iter().map(|t| t.id).collect();
        assert_eq!(ids, templates.iter().map(|t| t.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_second_batch_for_same_day_conflicts() {
        let (store, user, templates) = setup().await;
        let first = vec![DailyMissionAssignment::new(user.id, templates[0].id, day())];
        let second = vec![DailyMissionAssignment::new(user.id, templates[1].id, day())];

        store.insert_assignments(&first).await.unwrap();
        let err = store.insert_assignments(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

        let stored = store.list_assignments(user.id, day()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].template_id, templates[0].id);
    }

    #[tokio::test]
    async fn test_transition_applies_once() {
        let (store, user, templates) = setup().await;
        let assignment = DailyMissionAssignment::new(user.id, templates[0].id, day());
        store.insert_assignments(std::slice::from_ref(&assignment)).await.unwrap();

        let transition = AssignmentTransition {
            assignment_id: assignment.id,
            user_id: user.id,
            from: AssignmentStatus::Pending,
            to: AssignmentStatus::Completed,
            progress: Some(json!({"steps": 3})),
            completed_at: Some(Utc::now()),
        };
        assert!(store.transition_assignment(&transition).await.unwrap());
        assert!(!store.transition_assignment(&transition).await.unwrap());

        let stored = store.get_assignment(assignment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Completed);
        assert_eq!(stored.progress, json!({"steps": 3}));
        assert!(stored.completed_at.is_some());

        assert_eq!(store.assignment_counts(user.id).await.unwrap(), (1, 1));
    }
}
