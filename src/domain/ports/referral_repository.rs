//! Referral repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Referral;

/// Repository interface for referrals. Rows are unique per `(referrer_id, referee_phone)`.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Create a new referral.
    async fn create_referral(&self, referral: &Referral) -> DomainResult<()>;

    /// Whether the referrer already referred this phone, verified or not.
    async fn referral_exists(&self, referrer_id: Uuid, referee_phone: &str) -> DomainResult<bool>;

    /// Flip every unverified referral for the phone to verified.
    ///
    /// Returns only the rows this call changed; a second call for the same
    /// phone returns an empty list.
    async fn verify_by_phone(&self, referee_phone: &str, verified_at: DateTime<Utc>) -> DomainResult<Vec<Referral>>;

    /// Distinct referrers holding a verified referral for the phone, oldest referral first.
    async fn verified_referrers(&self, referee_phone: &str) -> DomainResult<Vec<Uuid>>;

    /// Count verified referrals of a referrer.
    async fn count_verified(&self, referrer_id: Uuid) -> DomainResult<u64>;

    /// List a referrer's referrals, newest first.
    async fn list_referrals(&self, referrer_id: Uuid) -> DomainResult<Vec<Referral>>;
}
