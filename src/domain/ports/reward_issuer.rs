//! Reward issuer port.
//!
//! Owns the experience/coin ledger and notification creation. Grants are
//! keyed: repeating a grant with the same idempotency key is a no-op, which is
//! what makes retries and later repair of partial failures safe.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GrantOutcome, NotificationKind, RewardReason};

#[async_trait]
pub trait RewardIssuer: Send + Sync {
    /// Add experience to a user.
    async fn grant_experience(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome>;

    /// Add coins to a user.
    async fn grant_coins(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome>;

    /// Remove coins, failing validation when the balance is insufficient.
    ///
    /// Returns the remaining balance.
    async fn debit_coins(&self, user_id: Uuid, amount: u32, reason: RewardReason) -> DomainResult<i64>;

    /// Queue a notification for the user.
    async fn create_notification(&self, user_id: Uuid, kind: NotificationKind, payload: Value) -> DomainResult<()>;
}
