use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActivityEvent, Badge, BadgeWithProgress, DailyMissionAssignment, DailyMissionStats,
    DailyMissionTemplate, EventKind, MissionParticipation, MissionReward, Referral,
    ReferralSummary, RulesConfig, User, VerificationReport,
};
use crate::domain::ports::{RecordStore, RewardIssuer};
use crate::services::{
    BadgeEvaluation, BadgeEvaluator, CheckInOutcome, DailyMissionService, ReferralVerifier,
    StreakTracker, WeightedSampler,
};

/// Result of a user action plus the badges it unlocked.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome<T> {
    pub result: T,
    /// Badges unlocked by the re-evaluation that followed the action.
    pub unlocked_badges: Vec<BadgeEvaluation>,
}

/// Composes the rules components into the user-action flows.
///
/// Every action that can move badge progress re-evaluates the user's active
/// badges afterwards. A failed re-evaluation is logged; the action itself has
/// already been committed.
pub struct GamificationEngine<S: RecordStore, R: RewardIssuer> {
    store: Arc<S>,
    rules: RulesConfig,
    streaks: StreakTracker<S, R>,
    badges: BadgeEvaluator<S, R>,
    missions: DailyMissionService<S, R>,
    referrals: ReferralVerifier<S, R>,
}

impl<S: RecordStore, R: RewardIssuer> GamificationEngine<S, R> {
    pub fn new(store: Arc<S>, rewards: Arc<R>, rules: RulesConfig) -> Self {
        Self {
            streaks: StreakTracker::new(store.clone(), rewards.clone(), rules.clone()),
            badges: BadgeEvaluator::new(store.clone(), rewards.clone(), rules.clone()),
            missions: DailyMissionService::new(store.clone(), rewards.clone(), rules.clone()),
            referrals: ReferralVerifier::new(store.clone(), rewards, rules.clone()),
            store,
            rules,
        }
    }

    /// Use a specific sampler for daily assignment (seeded in tests).
    pub fn with_sampler(mut self, sampler: WeightedSampler) -> Self {
        self.missions = self.missions.with_sampler(sampler);
        self
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn badges(&self) -> &BadgeEvaluator<S, R> {
        &self.badges
    }

    pub fn missions(&self) -> &DailyMissionService<S, R> {
        &self.missions
    }

    pub fn referrals(&self) -> &ReferralVerifier<S, R> {
        &self.referrals
    }

    pub async fn check_in(&self, user_id: Uuid) -> DomainResult<ActionOutcome<CheckInOutcome>> {
        self.check_in_at(user_id, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn check_in_at(&self, user_id: Uuid, now: DateTime<Utc>) -> DomainResult<ActionOutcome<CheckInOutcome>> {
        let outcome = self.streaks.record_check_in_at(user_id, now).await?;
        if outcome.already_checked_in {
            return Ok(ActionOutcome {
                result: outcome,
                unlocked_badges: Vec::new(),
            });
        }

        Ok(ActionOutcome {
            result: outcome,
            unlocked_badges: self.reevaluate(user_id, now).await,
        })
    }

    /// Record an externally observed activity and re-derive badge progress.
    #[instrument(skip(self, event), fields(user_id = %event.user_id, kind = event.kind.as_str()))]
    pub async fn record_activity(&self, event: ActivityEvent) -> DomainResult<Vec<BadgeEvaluation>> {
        self.store.record_event(&event).await?;
        Ok(self.reevaluate(event.user_id, event.occurred_at).await)
    }

    pub async fn assign_daily_missions(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> DomainResult<Vec<DailyMissionAssignment>> {
        self.missions.assign(user_id, date).await
    }

    pub async fn todays_missions(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>> {
        self.missions.today(user_id, date).await
    }

    pub async fn complete_daily_mission(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        proof: Value,
    ) -> DomainResult<ActionOutcome<MissionReward>> {
        self.complete_daily_mission_at(user_id, assignment_id, proof, Utc::now()).await
    }

    pub async fn complete_daily_mission_at(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        proof: Value,
        now: DateTime<Utc>,
    ) -> DomainResult<ActionOutcome<MissionReward>> {
        let reward = self.missions.complete_at(user_id, assignment_id, proof, now).await?;
        Ok(ActionOutcome {
            result: reward,
            unlocked_badges: self.reevaluate(user_id, now).await,
        })
    }

    /// Skip at the configured cost. Returns the remaining coin balance.
    pub async fn skip_daily_mission(&self, user_id: Uuid, assignment_id: Uuid) -> DomainResult<i64> {
        self.missions.skip(user_id, assignment_id, self.rules.skip_cost).await
    }

    pub async fn daily_mission_stats(&self, user_id: Uuid) -> DomainResult<DailyMissionStats> {
        self.missions.stats(user_id).await
    }

    pub async fn submit_referral(
        &self,
        referrer_id: Uuid,
        referee_name: &str,
        referee_phone: &str,
    ) -> DomainResult<Referral> {
        self.referrals.submit(referrer_id, referee_name, referee_phone).await
    }

    pub async fn register_referee(&self, referee_phone: &str) -> DomainResult<ActionOutcome<VerificationReport>> {
        self.register_referee_at(referee_phone, Utc::now()).await
    }

    /// A referee signed up: verify their referrals and re-evaluate each referrer.
    #[instrument(skip(self, referee_phone))]
    pub async fn register_referee_at(
        &self,
        referee_phone: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<ActionOutcome<VerificationReport>> {
        let report = self.referrals.verify_at(referee_phone, now).await?;

        let mut unlocked_badges = Vec::new();
        for referrer in &report.referrers {
            if referrer.newly_verified > 0 {
                let event = ActivityEvent::new(referrer.referrer_id, EventKind::ReferralVerified)
                    .with_attribute("verified_count", referrer.verified_count)
                    .at(now);
                self.record_quietly(&event).await;
            } else if !referrer.mission_completed {
                continue;
            }
            unlocked_badges.extend(self.reevaluate(referrer.referrer_id, now).await);
        }

        Ok(ActionOutcome {
            result: report,
            unlocked_badges,
        })
    }

    pub async fn referral_status(&self, referrer_id: Uuid) -> DomainResult<ReferralSummary> {
        self.referrals.referral_status(referrer_id).await
    }

    pub async fn list_badges(&self, user_id: Uuid) -> DomainResult<Vec<BadgeWithProgress>> {
        self.badges.list_with_progress(user_id).await
    }

    pub async fn evaluate_badges(&self, user_id: Uuid) -> DomainResult<Vec<BadgeEvaluation>> {
        self.badges.evaluate_all(user_id).await
    }

    /// Create a user with a normalized phone.
    #[instrument(skip(self, name, phone))]
    pub async fn register_user(&self, name: &str, phone: &str) -> DomainResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationFailed("user name cannot be empty".to_string()));
        }
        let user = User::new(name, phone);
        if user.phone.is_empty() {
            return Err(DomainError::ValidationFailed("phone cannot be empty".to_string()));
        }
        self.store.create_user(&user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn user(&self, user_id: Uuid) -> DomainResult<User> {
        self.store.get_user(user_id).await?.ok_or(DomainError::UserNotFound(user_id))
    }

    /// Add a badge definition after checking its condition tree.
    pub async fn add_badge(&self, badge: Badge) -> DomainResult<Badge> {
        badge
            .condition
            .validate_with_max_depth(self.rules.max_condition_depth)
            .map_err(DomainError::ValidationFailed)?;
        self.store.create_badge(&badge).await?;
        info!(badge_id = %badge.id, name = %badge.name, "badge added");
        Ok(badge)
    }

    pub async fn add_mission_template(&self, template: DailyMissionTemplate) -> DomainResult<DailyMissionTemplate> {
        if template.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("template title cannot be empty".to_string()));
        }
        self.store.create_template(&template).await?;
        info!(template_id = %template.id, weight = template.weight, "daily mission template added");
        Ok(template)
    }

    pub async fn enroll_referral_mission(&self, user_id: Uuid) -> DomainResult<MissionParticipation> {
        self.referrals.enroll(user_id).await
    }

    async fn record_quietly(&self, event: &ActivityEvent) {
        if let Err(e) = self.store.record_event(event).await {
            warn!(user_id = %event.user_id, kind = event.kind.as_str(), error = %e, "failed to record activity");
        }
    }

    async fn reevaluate(&self, user_id: Uuid, now: DateTime<Utc>) -> Vec<BadgeEvaluation> {
        match self.badges.evaluate_all_at(user_id, now).await {
            Ok(evaluations) => {
                let unlocked: Vec<_> = evaluations.into_iter().filter(|e| e.newly_unlocked).collect();
                debug!(%user_id, unlocked = unlocked.len(), "badges re-evaluated");
                unlocked
            }
            Err(e) => {
                warn!(%user_id, error = %e, "badge re-evaluation failed");
                Vec::new()
            }
        }
    }
}
