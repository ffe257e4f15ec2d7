//! Badge and badge-progress repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Badge, UserBadgeProgress};

/// Repository interface for badges and per-user progress.
///
/// Progress rows are unique per `(user_id, badge_id)`.
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Create a new badge.
    async fn create_badge(&self, badge: &Badge) -> DomainResult<()>;

    /// Get a badge by ID.
    async fn get_badge(&self, id: Uuid) -> DomainResult<Option<Badge>>;

    /// List active badges ordered by category.
    async fn list_active_badges(&self) -> DomainResult<Vec<Badge>>;

    /// Get stored progress for one badge.
    async fn get_progress(&self, user_id: Uuid, badge_id: Uuid) -> DomainResult<Option<UserBadgeProgress>>;

    /// List all stored progress rows for a user.
    async fn list_progress(&self, user_id: Uuid) -> DomainResult<Vec<UserBadgeProgress>>;

    /// Insert the first progress row. Fails with a conflict if one already exists.
    async fn insert_progress(&self, progress: &UserBadgeProgress) -> DomainResult<()>;

    /// Update progress if the stored value still equals `expected_progress`.
    ///
    /// An already-set `unlocked_at` is never overwritten.
    async fn update_progress(&self, progress: &UserBadgeProgress, expected_progress: f64) -> DomainResult<bool>;
}
