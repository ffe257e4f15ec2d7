//! Daily mission assignment and lifecycle.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, ErrorKind};
use crate::domain::models::{
    ActivityEvent, AssignmentStatus, DailyMissionAssignment, DailyMissionStats, DailyMissionTemplate,
    EventKind, MissionReward, NotificationKind, RewardReason, RulesConfig,
};
use crate::domain::ports::{AssignmentTransition, RecordStore, RewardIssuer};
use crate::services::streak_tracker::StreakTracker;
use crate::services::weighted_sampler::WeightedSampler;

pub struct DailyMissionService<S: RecordStore, R: RewardIssuer> {
    store: Arc<S>,
    rewards: Arc<R>,
    rules: RulesConfig,
    sampler: WeightedSampler,
    streaks: StreakTracker<S, R>,
}

impl<S: RecordStore, R: RewardIssuer> DailyMissionService<S, R> {
    pub fn new(store: Arc<S>, rewards: Arc<R>, rules: RulesConfig) -> Self {
        let streaks = StreakTracker::new(store.clone(), rewards.clone(), rules.clone());
        Self {
            store,
            rewards,
            rules,
            sampler: WeightedSampler::new(),
            streaks,
        }
    }

    pub fn with_sampler(mut self, sampler: WeightedSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Return the user's set for `date`, drawing and persisting it on first access.
    #[instrument(skip(self))]
    pub async fn assign(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?;

        let existing = self.store.list_assignments(user_id, date).await?;
        if !existing.is_empty() {
            debug!(%user_id, %date, count = existing.len(), "daily missions already assigned");
            return Ok(existing);
        }

        let templates = self.store.list_active_templates().await?;
        if templates.is_empty() {
            return Err(DomainError::ValidationFailed(
                "no active daily mission templates".to_string(),
            ));
        }

        let picked = self.sampler.sample(
            templates,
            self.rules.daily_mission_count,
            DailyMissionTemplate::effective_weight,
        );
        let assignments: Vec<DailyMissionAssignment> = picked
            .iter()
            .map(|t| DailyMissionAssignment::new(user_id, t.id, date))
            .collect();

        match self.store.insert_assignments(&assignments).await {
            Ok(()) => {
                info!(%user_id, %date, count = assignments.len(), "daily missions assigned");
                // Later calls read the stored rows; return the same representation now.
                self.store.list_assignments(user_id, date).await
            }
            Err(e) if e.kind() == ErrorKind::Conflict => {
                debug!(%user_id, %date, "concurrent assignment won; returning its set");
                self.store.list_assignments(user_id, date).await
            }
            Err(e) => Err(e),
        }
    }

    /// The day's assignments without drawing new ones.
    pub async fn today(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>> {
        self.store.list_assignments(user_id, date).await
    }

    pub async fn complete(&self, user_id: Uuid, assignment_id: Uuid, proof: Value) -> DomainResult<MissionReward> {
        self.complete_at(user_id, assignment_id, proof, Utc::now()).await
    }

    /// Complete a pending assignment and pay its rewards.
    ///
    /// Reward and event failures after the status flip are logged, not undone.
    #[instrument(skip(self, proof))]
    pub async fn complete_at(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        proof: Value,
        now: DateTime<Utc>,
    ) -> DomainResult<MissionReward> {
        let assignment = self.owned_pending(user_id, assignment_id, AssignmentStatus::Completed).await?;
        let template = self
            .store
            .get_template(assignment.template_id)
            .await?
            .ok_or(DomainError::TemplateNotFound(assignment.template_id))?;

        self.flip(&assignment, AssignmentStatus::Completed, Some(proof), Some(now)).await?;
        info!(%user_id, %assignment_id, template = %template.title, "daily mission completed");

        let event = ActivityEvent::new(user_id, EventKind::DailyMissionCompleted)
            .with_attribute("template_id", template.id.to_string())
            .with_attribute("assignment_id", assignment_id.to_string())
            .at(now);
        if let Err(e) = self.store.record_event(&event).await {
            warn!(%user_id, %assignment_id, error = %e, "failed to record completion event");
        }

        self.pay(
            user_id,
            template.xp_reward,
            &format!("daily_mission:{assignment_id}:xp"),
            true,
        )
        .await;
        self.pay(
            user_id,
            template.coin_reward,
            &format!("daily_mission:{assignment_id}:coins"),
            false,
        )
        .await;

        if let Err(e) = self.streaks.record_check_in_at(user_id, now).await {
            warn!(%user_id, error = %e, "check-in after mission completion failed");
        }

        let all_complete_bonus = self.all_complete_bonus(user_id, assignment.assigned_date).await;

        Ok(MissionReward {
            xp_reward: template.xp_reward,
            coin_reward: template.coin_reward,
            all_complete_bonus,
        })
    }

    /// Pay `coin_cost` to skip a pending assignment.
    ///
    /// The assignment is claimed before the debit, so a completion that wins
    /// the race is never charged. A failed debit puts it back to pending.
    #[instrument(skip(self))]
    pub async fn skip(&self, user_id: Uuid, assignment_id: Uuid, coin_cost: u32) -> DomainResult<i64> {
        let assignment = self.owned_pending(user_id, assignment_id, AssignmentStatus::Skipped).await?;
        self.flip(&assignment, AssignmentStatus::Skipped, None, None).await?;

        match self
            .rewards
            .debit_coins(user_id, coin_cost, RewardReason::DailyMissionSkip)
            .await
        {
            Ok(balance) => {
                info!(%user_id, %assignment_id, coin_cost, balance, "daily mission skipped");
                Ok(balance)
            }
            Err(e) => {
                self.release_skip(&assignment).await;
                Err(e)
            }
        }
    }

    /// Lifetime assigned/completed counts and completion rate.
    pub async fn stats(&self, user_id: Uuid) -> DomainResult<DailyMissionStats> {
        let (assigned, completed) = self.store.assignment_counts(user_id).await?;
        Ok(DailyMissionStats::from_counts(assigned, completed))
    }

    async fn owned_pending(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        target: AssignmentStatus,
    ) -> DomainResult<DailyMissionAssignment> {
        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or(DomainError::AssignmentNotFound(assignment_id))?;

        if assignment.status != AssignmentStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: assignment.status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
        Ok(assignment)
    }

    async fn flip(
        &self,
        assignment: &DailyMissionAssignment,
        to: AssignmentStatus,
        progress: Option<Value>,
        completed_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let transition = AssignmentTransition {
            assignment_id: assignment.id,
            user_id: assignment.user_id,
            from: AssignmentStatus::Pending,
            to,
            progress,
            completed_at,
        };
        if self.store.transition_assignment(&transition).await? {
            Ok(())
        } else {
            Err(DomainError::conflict("daily_missions", assignment.id))
        }
    }

    async fn release_skip(&self, assignment: &DailyMissionAssignment) {
        let transition = AssignmentTransition {
            assignment_id: assignment.id,
            user_id: assignment.user_id,
            from: AssignmentStatus::Skipped,
            to: AssignmentStatus::Pending,
            progress: None,
            completed_at: None,
        };
        match self.store.transition_assignment(&transition).await {
            Ok(true) => debug!(assignment_id = %assignment.id, "skip released after failed debit"),
            Ok(false) => warn!(assignment_id = %assignment.id, "skip release found the assignment already moved"),
            Err(e) => warn!(assignment_id = %assignment.id, error = %e, "failed to release skipped assignment"),
        }
    }

    async fn pay(&self, user_id: Uuid, amount: u32, key: &str, experience: bool) {
        if amount == 0 {
            return;
        }
        let reason = RewardReason::DailyMissionComplete;
        let result = if experience {
            self.rewards.grant_experience(user_id, amount, reason, key).await
        } else {
            self.rewards.grant_coins(user_id, amount, reason, key).await
        };
        if let Err(e) = result {
            warn!(%user_id, %key, amount, error = %e, "failed to grant daily mission reward");
        }
    }

    async fn all_complete_bonus(&self, user_id: Uuid, date: NaiveDate) -> Option<u32> {
        let day = match self.store.list_assignments(user_id, date).await {
            Ok(day) => day,
            Err(e) => {
                warn!(%user_id, %date, error = %e, "could not check all-complete bonus");
                return None;
            }
        };
        if day.is_empty() || day.iter().any(|a| a.status != AssignmentStatus::Completed) {
            return None;
        }

        let bonus = self.rules.all_complete_bonus_xp;
        let key = format!("all_daily_complete:{user_id}:{date}");
        match self
            .rewards
            .grant_experience(user_id, bonus, RewardReason::AllDailyComplete, &key)
            .await
        {
            Ok(outcome) if outcome.is_granted() => {
                info!(%user_id, %date, bonus, "all daily missions completed");
                let payload = json!({ "date": date, "bonusXp": bonus });
                if let Err(e) = self
                    .rewards
                    .create_notification(user_id, NotificationKind::AllDailyComplete, payload)
                    .await
                {
                    warn!(%user_id, error = %e, "failed to notify all-complete bonus");
                }
                Some(bonus)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(%user_id, %key, error = %e, "failed to grant all-complete bonus");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::models::User;
    use crate::domain::ports::{ActivityRepository, DailyMissionRepository, UserRepository};
    use chrono::TimeZone;
    use serde_json::Map;

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: DailyMissionService<InMemoryStore, InMemoryStore>,
        user: User,
    }

    async fn setup(templates: usize, coins: i64) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let user = User::new("Seo", "010-2222-3333").with_coins(coins);
        store.create_user(&user).await.unwrap();
        for i in 0..templates {
            let template = DailyMissionTemplate::new(format!("Mission {i}"))
                .with_weight(1.0 + i as f64)
                .with_rewards(10, 5);
            store.create_template(&template).await.unwrap();
        }
        let service = DailyMissionService::new(store.clone(), store.clone(), RulesConfig::default())
            .with_sampler(WeightedSampler::seeded(5));
        Fixture { store, service, user }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_assign_draws_five_distinct_templates() {
        let f = setup(8, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        assert_eq!(set.len(), 5);
        let mut ids: Vec<_> = set.iter().map(|a| a.template_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert!(set.iter().all(|a| a.status == AssignmentStatus::Pending));
    }

    #[tokio::test]
    async fn test_assign_is_idempotent_per_day() {
        let f = setup(8, 0).await;
        let first = f.service.assign(f.user.id, date()).await.unwrap();
        let second = f.service.assign(f.user.id, date()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_assign_with_small_pool_takes_all() {
        let f = setup(3, 0).await;
        assert_eq!(f.service.assign(f.user.id, date()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_assign_without_templates_fails() {
        let f = setup(0, 0).await;
        let err = f.service.assign(f.user.id, date()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_complete_pays_rewards_and_records_event() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();

        let reward = f
            .service
            .complete_at(f.user.id, set[0].id, json!({"photo": "a.jpg"}), noon())
            .await
            .unwrap();
        assert_eq!(reward.xp_reward, 10);
        assert_eq!(reward.coin_reward, 5);
        assert_eq!(reward.all_complete_bonus, None);

        let user = f.store.get_user(f.user.id).await.unwrap().unwrap();
        assert_eq!(user.experience_points, 10);
        assert_eq!(user.coins, 5);
        assert_eq!(user.consecutive_days, 1);

        let events = f
            .store
            .count_events(f.user.id, EventKind::DailyMissionCompleted, &Map::new())
            .await
            .unwrap();
        assert_eq!(events, 1);

        let stored = f.store.get_assignment(set[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Completed);
        assert_eq!(stored.progress, json!({"photo": "a.jpg"}));
    }

    #[tokio::test]
    async fn test_completing_whole_day_pays_bonus_once() {
        let f = setup(2, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();

        let first = f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();
        let last = f.service.complete_at(f.user.id, set[1].id, json!({}), noon()).await.unwrap();
        assert_eq!(first.all_complete_bonus, None);
        assert_eq!(last.all_complete_bonus, Some(100));

        let user = f.store.get_user(f.user.id).await.unwrap().unwrap();
        assert_eq!(user.experience_points, 120);
    }

    #[tokio::test]
    async fn test_complete_twice_is_invalid() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();

        let err = f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_complete_foreign_assignment_is_not_found() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        let err = f
            .service
            .complete_at(Uuid::new_v4(), set[0].id, json!({}), noon())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AssignmentNotFound(_)));
    }

    #[tokio::test]
    async fn test_reward_failure_keeps_completion() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.store.set_reward_failure(true);

        f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();
        let stored = f.store.get_assignment(set[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Completed);
        assert_eq!(f.store.get_user(f.user.id).await.unwrap().unwrap().coins, 0);
    }

    #[tokio::test]
    async fn test_skip_debits_coins() {
        let f = setup(6, 150).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();

        let balance = f.service.skip(f.user.id, set[0].id, 100).await.unwrap();
        assert_eq!(balance, 50);
        let stored = f.store.get_assignment(set[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Skipped);
    }

    #[tokio::test]
    async fn test_skip_with_insufficient_balance_changes_nothing() {
        let f = setup(6, 20).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();

        let err = f.service.skip(f.user.id, set[0].id, 100).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let stored = f.store.get_assignment(set[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Pending);
        assert_eq!(f.store.get_user(f.user.id).await.unwrap().unwrap().coins, 20);
    }

    #[tokio::test]
    async fn test_skip_with_ledger_down_releases_assignment() {
        let f = setup(6, 500).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.store.set_reward_failure(true);

        let err = f.service.skip(f.user.id, set[0].id, 100).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        let stored = f.store.get_assignment(set[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Pending);

        f.store.set_reward_failure(false);
        assert_eq!(f.service.skip(f.user.id, set[0].id, 100).await.unwrap(), 400);
    }

    #[tokio::test]
    async fn test_skip_after_completion_charges_nothing() {
        let f = setup(6, 500).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();

        let err = f.service.skip(f.user.id, set[0].id, 100).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(f.store.get_user(f.user.id).await.unwrap().unwrap().coins, 505);
    }

    #[tokio::test]
    async fn test_completion_counts_as_check_in_activity() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();
        f.service.complete_at(f.user.id, set[1].id, json!({}), noon()).await.unwrap();

        let check_ins = f
            .store
            .count_events(f.user.id, EventKind::CheckIn, &Map::new())
            .await
            .unwrap();
        assert_eq!(check_ins, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let f = setup(6, 0).await;
        let set = f.service.assign(f.user.id, date()).await.unwrap();
        f.service.complete_at(f.user.id, set[0].id, json!({}), noon()).await.unwrap();
        f.service.complete_at(f.user.id, set[1].id, json!({}), noon()).await.unwrap();

        let stats = f.service.stats(f.user.id).await.unwrap();
        assert_eq!(stats.total_assigned, 5);
        assert_eq!(stats.total_completed, 2);
        assert!((stats.completion_rate - 40.0).abs() < 1e-9);
    }
}
