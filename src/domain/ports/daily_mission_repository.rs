//! Daily mission repository port.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AssignmentStatus, DailyMissionAssignment, DailyMissionTemplate};

/// Guarded status change of an assignment.
#[derive(Debug, Clone)]
pub struct AssignmentTransition {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
    /// Replaces the stored progress payload when set.
    pub progress: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Repository interface for daily mission templates and assignments.
#[async_trait]
pub trait DailyMissionRepository: Send + Sync {
    /// Create a new template.
    async fn create_template(&self, template: &DailyMissionTemplate) -> DomainResult<()>;

    /// Get a template by ID.
    async fn get_template(&self, id: Uuid) -> DomainResult<Option<DailyMissionTemplate>>;

    /// List active templates in a stable order.
    async fn list_active_templates(&self) -> DomainResult<Vec<DailyMissionTemplate>>;

    /// List a user's assignments for one day, oldest first.
    async fn list_assignments(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>>;

    /// Insert a day's batch atomically.
    ///
    /// Fails with a conflict, inserting nothing, if the user already has any
    /// assignment for that date.
    async fn insert_assignments(&self, assignments: &[DailyMissionAssignment]) -> DomainResult<()>;

    /// Get an assignment by ID.
    async fn get_assignment(&self, id: Uuid) -> DomainResult<Option<DailyMissionAssignment>>;

    /// Apply a transition if the assignment is still in `from`. Returns whether it applied.
    async fn transition_assignment(&self, transition: &AssignmentTransition) -> DomainResult<bool>;

    /// Lifetime `(assigned, completed)` counts for a user.
    async fn assignment_counts(&self, user_id: Uuid) -> DomainResult<(u64, u64)>;
}
