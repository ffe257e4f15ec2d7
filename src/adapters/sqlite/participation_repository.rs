//! SQLite implementation of the ParticipationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MissionParticipation, MissionType, ParticipationStatus};
use crate::domain::ports::ParticipationRepository;

const PARTICIPATION_COLUMNS: &str = "id, user_id, mission_type, status, proof_data, completed_at, created_at";

#[async_trait]
impl ParticipationRepository for SqliteRecordStore {
    async fn create_participation(&self, participation: &MissionParticipation) -> DomainResult<()> {
        let proof_json = serde_json::to_string(&participation.proof_data)?;

        sqlx::query(
            r#"INSERT INTO mission_participations (id, user_id, mission_type, status, proof_data, completed_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(participation.id.to_string())
        .bind(participation.user_id.to_string())
        .bind(participation.mission_type.as_str())
        .bind(participation.status.as_str())
        .bind(&proof_json)
        .bind(participation.completed_at.map(format_datetime))
        .bind(format_datetime(participation.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_participation(&self, id: Uuid) -> DomainResult<Option<MissionParticipation>> {
        let row: Option<ParticipationRow> = sqlx::query_as(&format!(
            "SELECT {PARTICIPATION_COLUMNS} FROM mission_participations WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(MissionParticipation::try_from).transpose()
    }

    async fn find_active_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>> {
        let row: Option<ParticipationRow> = sqlx::query_as(&format!(
            r#"SELECT {PARTICIPATION_COLUMNS} FROM mission_participations
               WHERE user_id = ? AND mission_type = ? AND status IN ('pending', 'in_progress')
               ORDER BY created_at DESC LIMIT 1"#
        ))
        .bind(user_id.to_string())
        .bind(mission_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(MissionParticipation::try_from).transpose()
    }

    async fn find_latest_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>> {
        let row: Option<ParticipationRow> = sqlx::query_as(&format!(
            r#"SELECT {PARTICIPATION_COLUMNS} FROM mission_participations
               WHERE user_id = ? AND mission_type = ?
               ORDER BY created_at DESC, rowid DESC LIMIT 1"#
        ))
        .bind(user_id.to_string())
        .bind(mission_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(MissionParticipation::try_from).transpose()
    }

    async fn complete_participation(
        &self,
        id: Uuid,
        expected_status: ParticipationStatus,
        proof_data: &Value,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let proof_json = serde_json::to_string(proof_data)?;

        let result = sqlx::query(
            r#"UPDATE mission_participations SET status = 'completed', proof_data = ?, completed_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(&proof_json)
        .bind(format_datetime(completed_at))
        .bind(id.to_string())
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct ParticipationRow {
    id: String,
    user_id: String,
    mission_type: String,
    status: String,
    proof_data: Option<String>,
    completed_at: Option<String>,
    created_at: String,
}

impl TryFrom<ParticipationRow> for MissionParticipation {
    type Error = DomainError;

    fn try_from(row: ParticipationRow) -> Result<Self, Self::Error> {
        let mission_type = MissionType::from_str(&row.mission_type)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid mission type: {}", row.mission_type)))?;
        let status = ParticipationStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(MissionParticipation {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            mission_type,
            status,
            proof_data: parse_json_or_default(row.proof_data)?,
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

    #[tokio::test]
    async fn test_active_participation_completes_once() {
        let store = SqliteRecordStore::new(create_migrated_test_pool().await.unwrap());
        let user = User::new("Baek", "010");
        store.create_user(&user).await.unwrap();

        let participation = MissionParticipation::new(user.id, MissionType::Referral);
        store.create_participation(&participation).await.unwrap();
        assert!(store.find_active_participation(user.id, MissionType::Sns).await.unwrap().is_none());

        let active = store
            .find_active_participation(user.id, MissionType::Referral)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, participation.id);

        let proof = json!({"verifiedReferrals": []});
        assert!(store
            .complete_participation(active.id, active.status, &proof, Utc::now())
            .await
            .unwrap());
        assert!(!store
            .complete_participation(active.id, active.status, &proof, Utc::now())
            .await
            .unwrap());

        let stored = store.get_participation(active.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ParticipationStatus::Completed);
        assert_eq!(stored.proof_data, proof);
        assert!(store.find_active_participation(user.id, MissionType::Referral).await.unwrap().is_none());

        let latest = store
            .find_latest_participation(user.id, MissionType::Referral)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, participation.id);
        assert_eq!(latest.status, ParticipationStatus::Completed);
    }
}
