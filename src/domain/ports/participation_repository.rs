//! Mission participation repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{MissionParticipation, MissionType, ParticipationStatus};

#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    /// Create a new participation.
    async fn create_participation(&self, participation: &MissionParticipation) -> DomainResult<()>;

    /// Get a participation by ID.
    async fn get_participation(&self, id: Uuid) -> DomainResult<Option<MissionParticipation>>;

    /// Most recent pending or in-progress participation of a user in a mission type.
    async fn find_active_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>>;

    /// Most recent participation of a user in a mission type, whatever its status.
    async fn find_latest_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>>;

    /// Mark completed if the status is still `expected_status`. Returns whether it applied.
    async fn complete_participation(
        &self,
        id: Uuid,
        expected_status: ParticipationStatus,
        proof_data: &Value,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<bool>;
}
