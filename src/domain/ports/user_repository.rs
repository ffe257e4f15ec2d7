//! User repository port.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::User;

/// Repository interface for User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user.
    async fn create_user(&self, user: &User) -> DomainResult<()>;

    /// Get a user by ID.
    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>>;

    /// Store a new streak state, guarded by the previously read check-in date.
    ///
    /// Returns `false` when `last_check_in` no longer equals `expected_last_check_in`
    /// (or the user is gone), i.e. another writer got there first.
    async fn update_check_in(
        &self,
        id: Uuid,
        expected_last_check_in: Option<NaiveDate>,
        consecutive_days: u32,
        check_in_date: NaiveDate,
    ) -> DomainResult<bool>;
}
