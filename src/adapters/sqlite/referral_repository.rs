//! SQLite implementation of the ReferralRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid, SqliteRecordStore};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Referral;
use crate::domain::ports::ReferralRepository;

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referee_name, referee_phone, is_verified, verified_at, reward_paid, created_at";

#[async_trait]
impl ReferralRepository for SqliteRecordStore {
    async fn create_referral(&self, referral: &Referral) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO referrals (id, referrer_id, referee_name, referee_phone, is_verified, verified_at, reward_paid, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(referral.id.to_string())
        .bind(referral.referrer_id.to_string())
        .bind(&referral.referee_name)
        .bind(&referral.referee_phone)
        .bind(referral.is_verified)
        .bind(referral.verified_at.map(format_datetime))
        .bind(referral.reward_paid)
        .bind(format_datetime(referral.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn referral_exists(&self, referrer_id: Uuid, referee_phone: &str) -> DomainResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM referrals WHERE referrer_id = ? AND referee_phone = ?)",
        )
        .bind(referrer_id.to_string())
        .bind(referee_phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn verify_by_phone(&self, referee_phone: &str, verified_at: DateTime<Utc>) -> DomainResult<Vec<Referral>> {
        // Single statement: concurrent verifiers each get only the rows they flipped.
        let rows: Vec<ReferralRow> = sqlx::query_as(&format!(
            r#"UPDATE referrals SET is_verified = 1, verified_at = ?
               WHERE referee_phone = ? AND is_verified = 0
               RETURNING {REFERRAL_COLUMNS}"#
        ))
        .bind(format_datetime(verified_at))
        .bind(referee_phone)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Referral::try_from).collect()
    }

    async fn verified_referrers(&self, referee_phone: &str) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT referrer_id FROM referrals
               WHERE referee_phone = ? AND is_verified = 1
               GROUP BY referrer_id ORDER BY MIN(rowid)"#,
        )
        .bind(referee_phone)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn count_verified(&self, referrer_id: Uuid) -> DomainResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM referrals WHERE referrer_id = ? AND is_verified = 1")
                .bind(referrer_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn list_referrals(&self, referrer_id: Uuid) -> DomainResult<Vec<Referral>> {
        let rows: Vec<ReferralRow> = sqlx::query_as(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = ? ORDER BY created_at DESC"
        ))
        .bind(referrer_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Referral::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ReferralRow {
    id: String,
    referrer_id: String,
    referee_name: String,
    referee_phone: String,
    is_verified: bool,
    verified_at: Option<String>,
    reward_paid: bool,
    created_at: String,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = DomainError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(Referral {
            id: parse_uuid(&row.id)?,
            referrer_id: parse_uuid(&row.referrer_id)?,
            referee_name: row.referee_name,
            referee_phone: row.referee_phone,
            is_verified: row.is_verified,
            verified_at: parse_optional_datetime(row.verified_at)?,
            reward_paid: row.reward_paid,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
