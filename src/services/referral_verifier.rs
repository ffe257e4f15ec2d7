//! Referral submission and phone-match verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_phone, MissionParticipation, MissionType, NotificationKind, Referral, ReferralSummary, ReferrerProgress,
    RulesConfig, VerificationReport,
};
use crate::domain::ports::{RecordStore, RewardIssuer};

pub struct ReferralVerifier<S: RecordStore, R: RewardIssuer> {
    store: Arc<S>,
    rewards: Arc<R>,
    rules: RulesConfig,
}

impl<S: RecordStore, R: RewardIssuer> ReferralVerifier<S, R> {
    pub fn new(store: Arc<S>, rewards: Arc<R>, rules: RulesConfig) -> Self {
        Self { store, rewards, rules }
    }

    /// Register that `referrer_id` invited someone with this phone.
    #[instrument(skip(self, referee_name, referee_phone))]
    pub async fn submit(&self, referrer_id: Uuid, referee_name: &str, referee_phone: &str) -> DomainResult<Referral> {
        let referee_name = referee_name.trim();
        if referee_name.is_empty() {
            return Err(DomainError::ValidationFailed("referee name cannot be empty".to_string()));
        }
        let phone = normalize_phone(referee_phone);
        if phone.is_empty() {
            return Err(DomainError::ValidationFailed("referee phone cannot be empty".to_string()));
        }

        let referrer = self
            .store
            .get_user(referrer_id)
            .await?
            .ok_or(DomainError::UserNotFound(referrer_id))?;
        if referrer.phone == phone {
            return Err(DomainError::ValidationFailed("cannot refer yourself".to_string()));
        }
        if self.store.referral_exists(referrer_id, &phone).await? {
            return Err(DomainError::ValidationFailed(format!(
                "phone {phone} was already referred"
            )));
        }

        let referral = Referral::new(referrer_id, referee_name, &phone);
        self.store.create_referral(&referral).await?;
        info!(%referrer_id, referral_id = %referral.id, "referral submitted");
        Ok(referral)
    }

    pub async fn verify(&self, referee_phone: &str) -> DomainResult<VerificationReport> {
        self.verify_at(referee_phone, Utc::now()).await
    }

    /// Verify every pending referral for a newly registered phone.
    ///
    /// Every referrer holding a verified referral for the phone is then
    /// re-checked, including when this call flipped nothing, so a retry after
    /// a conflict still completes a mission that crossed the threshold. A
    /// failing referrer does not stop the others; the first error is returned
    /// once all of them were tried.
    #[instrument(skip(self, referee_phone))]
    pub async fn verify_at(&self, referee_phone: &str, now: DateTime<Utc>) -> DomainResult<VerificationReport> {
        let phone = normalize_phone(referee_phone);
        if phone.is_empty() {
            return Err(DomainError::ValidationFailed("referee phone cannot be empty".to_string()));
        }

        let flipped = self.store.verify_by_phone(&phone, now).await?;
        if flipped.is_empty() {
            debug!(%phone, "no pending referrals for phone");
        } else {
            info!(%phone, count = flipped.len(), "referrals verified");
        }

        for referral in &flipped {
            let payload = json!({
                "referralId": referral.id,
                "refereeName": referral.referee_name,
            });
            if let Err(e) = self
                .rewards
                .create_notification(referral.referrer_id, NotificationKind::ReferralVerified, payload)
                .await
            {
                warn!(referrer_id = %referral.referrer_id, error = %e, "failed to notify referral verification");
            }
        }

        let referrer_ids = self.store.verified_referrers(&phone).await?;
        let mut referrers = Vec::with_capacity(referrer_ids.len());
        let mut first_error = None;
        for referrer_id in referrer_ids {
            match self.advance_referrer(referrer_id, now).await {
                Ok(mut progress) => {
                    progress.newly_verified = flipped.iter().filter(|r| r.referrer_id == referrer_id).count();
                    referrers.push(progress);
                }
                Err(e) => {
                    warn!(%referrer_id, error = %e, "failed to advance referrer");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(VerificationReport {
            phone,
            newly_verified: flipped.len(),
            referrers,
        })
    }

    /// Start the referral mission for a user, or return their current one.
    ///
    /// A finished mission is returned as-is. A user already past the threshold
    /// gets a new mission completed on the spot.
    #[instrument(skip(self))]
    pub async fn enroll(&self, user_id: Uuid) -> DomainResult<MissionParticipation> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?;

        let participation = match self.store.find_latest_participation(user_id, MissionType::Referral).await? {
            Some(latest) if !latest.status.is_active() => {
                debug!(%user_id, participation_id = %latest.id, "referral mission already finished");
                return Ok(latest);
            }
            Some(active) => active,
            None => {
                let participation = MissionParticipation::new(user_id, MissionType::Referral);
                self.store.create_participation(&participation).await?;
                info!(%user_id, participation_id = %participation.id, "referral mission started");
                participation
            }
        };

        let progress = self.advance_referrer(user_id, Utc::now()).await?;
        if !progress.mission_completed {
            return Ok(participation);
        }
        Ok(self
            .store
            .get_participation(participation.id)
            .await?
            .unwrap_or(participation))
    }

    /// Totals and payback amounts for a referrer.
    pub async fn referral_status(&self, referrer_id: Uuid) -> DomainResult<ReferralSummary> {
        self.store
            .get_user(referrer_id)
            .await?
            .ok_or(DomainError::UserNotFound(referrer_id))?;
        let referrals = self.store.list_referrals(referrer_id).await?;
        Ok(ReferralSummary::from_referrals(&referrals))
    }

    async fn advance_referrer(&self, referrer_id: Uuid, now: DateTime<Utc>) -> DomainResult<ReferrerProgress> {
        let verified_count = self.store.count_verified(referrer_id).await?;
        let mut progress = ReferrerProgress {
            referrer_id,
            verified_count,
            newly_verified: 0,
            mission_completed: false,
        };
        if verified_count < self.rules.referral_threshold {
            return Ok(progress);
        }

        let Some(participation) = self
            .store
            .find_active_participation(referrer_id, MissionType::Referral)
            .await?
        else {
            debug!(%referrer_id, verified_count, "threshold reached without an active referral mission");
            return Ok(progress);
        };

        let proof = self.referral_proof(referrer_id).await?;
        let applied = self
            .store
            .complete_participation(participation.id, participation.status, &proof, now)
            .await?;
        if !applied {
            // Someone else may have completed it in the meantime.
            let current = self.store.get_participation(participation.id).await?;
            if current.is_some_and(|p| p.status.is_active()) {
                return Err(DomainError::conflict("mission_participations", participation.id));
            }
            return Ok(progress);
        }

        progress.mission_completed = true;
        info!(%referrer_id, verified_count, participation_id = %participation.id, "referral mission completed");
        let payload = json!({
            "participationId": participation.id,
            "missionType": MissionType::Referral.as_str(),
            "verifiedCount": verified_count,
        });
        if let Err(e) = self
            .rewards
            .create_notification(referrer_id, NotificationKind::MissionCompleted, payload)
            .await
        {
            warn!(%referrer_id, error = %e, "failed to notify referral mission completion");
        }
        Ok(progress)
    }

    async fn referral_proof(&self, referrer_id: Uuid) -> DomainResult<Value> {
        let verified: Vec<Value> = self
            .store
            .list_referrals(referrer_id)
            .await?
            .into_iter()
            .filter(|r| r.is_verified)
            .map(|r| {
                json!({
                    "name": r.referee_name,
                    "phone": r.referee_phone,
                    "verifiedAt": r.verified_at,
                })
            })
            .collect();
        Ok(json!({ "verifiedReferrals": verified }))
    }
}
