use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    apply_experience, ActivityEvent, AssignmentStatus, Badge, DailyMissionAssignment,
    DailyMissionTemplate, EventKind, GrantOutcome, MissionParticipation, MissionType,
    Notification, NotificationKind, ParticipationStatus, Referral, RewardReason, User,
    UserBadgeProgress, DAILY_LOGIN_STREAK,
};
use crate::domain::ports::{
    ActivityRepository, AssignmentTransition, BadgeRepository, DailyMissionRepository,
    ParticipationRepository, ReferralRepository, RewardIssuer, UserRepository,
};

/// One applied ledger movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: Uuid,
    pub reason: RewardReason,
    pub xp_delta: i64,
    pub coin_delta: i64,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    badges: Vec<Badge>,
    progress: HashMap<(Uuid, Uuid), UserBadgeProgress>,
    templates: Vec<DailyMissionTemplate>,
    assignments: Vec<DailyMissionAssignment>,
    referrals: Vec<Referral>,
    participations: Vec<MissionParticipation>,
    events: Vec<ActivityEvent>,
    named_streaks: HashMap<(Uuid, String), u32>,
    grant_keys: HashSet<String>,
    failing_participations: HashSet<Uuid>,
    ledger: Vec<LedgerEntry>,
    notifications: Vec<Notification>,
}

/// In-memory implementation of every record store port and [`RewardIssuer`].
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    fail_rewards: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every reward issuer call fail as if the ledger were unreachable.
    pub fn set_reward_failure(&self, fail: bool) {
        self.fail_rewards.store(fail, Ordering::SeqCst);
    }

    /// Make completing one participation fail as if the store were unreachable.
    pub async fn set_participation_failure(&self, participation_id: Uuid, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.failing_participations.insert(participation_id);
        } else {
            state.failing_participations.remove(&participation_id);
        }
    }

    /// Set a named (non check-in) streak counter.
    pub async fn set_streak(&self, user_id: Uuid, streak_type: &str, count: u32) {
        self.state
            .write()
            .await
            .named_streaks
            .insert((user_id, streak_type.to_string()), count);
    }

    /// Notifications created for a user, oldest first.
    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Ledger movements for a user, oldest first.
    pub async fn ledger_for(&self, user_id: Uuid) -> Vec<LedgerEntry> {
        self.state
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    fn check_rewards_available(&self) -> DomainResult<()> {
        if self.fail_rewards.load(Ordering::SeqCst) {
            return Err(DomainError::UpstreamUnavailable(
                "reward ledger unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(DomainError::conflict("users", user.id));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn update_check_in(
        &self,
        id: Uuid,
        expected_last_check_in: Option<NaiveDate>,
        consecutive_days: u32,
        check_in_date: NaiveDate,
    ) -> DomainResult<bool> {
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.last_check_in != expected_last_check_in {
            return Ok(false);
        }
        user.consecutive_days = consecutive_days;
        user.last_check_in = Some(check_in_date);
        Ok(true)
    }
}

#[async_trait]
impl BadgeRepository for InMemoryStore {
    async fn create_badge(&self, badge: &Badge) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if state.badges.iter().any(|b| b.id == badge.id) {
            return Err(DomainError::conflict("badges", badge.id));
        }
        state.badges.push(badge.clone());
        Ok(())
    }

    async fn get_badge(&self, id: Uuid) -> DomainResult<Option<Badge>> {
        Ok(self.state.read().await.badges.iter().find(|b| b.id == id).cloned())
    }

    async fn list_active_badges(&self) -> DomainResult<Vec<Badge>> {
        let state = self.state.read().await;
        let mut badges: Vec<Badge> = state.badges.iter().filter(|b| b.is_active).cloned().collect();
        badges.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(badges)
    }

    async fn get_progress(&self, user_id: Uuid, badge_id: Uuid) -> DomainResult<Option<UserBadgeProgress>> {
        Ok(self.state.read().await.progress.get(&(user_id, badge_id)).cloned())
    }

    async fn list_progress(&self, user_id: Uuid) -> DomainResult<Vec<UserBadgeProgress>> {
        let state = self.state.read().await;
        Ok(state
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_progress(&self, progress: &UserBadgeProgress) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let key = (progress.user_id, progress.badge_id);
        if state.progress.contains_key(&key) {
            return Err(DomainError::conflict(
                "user_badges",
                format!("{}:{}", progress.user_id, progress.badge_id),
            ));
        }
        state.progress.insert(key, progress.clone());
        Ok(())
    }

    async fn update_progress(&self, progress: &UserBadgeProgress, expected_progress: f64) -> DomainResult<bool> {
        let mut state = self.state.write().await;
        let Some(stored) = state.progress.get_mut(&(progress.user_id, progress.badge_id)) else {
            return Ok(false);
        };
        if (stored.progress - expected_progress).abs() > f64::EPSILON {
            return Ok(false);
        }
        stored.progress = progress.progress;
        stored.unlocked_at = stored.unlocked_at.or(progress.unlocked_at);
        stored.updated_at = progress.updated_at;
        Ok(true)
    }
}

#[async_trait]
impl DailyMissionRepository for InMemoryStore {
    async fn create_template(&self, template: &DailyMissionTemplate) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if state.templates.iter().any(|t| t.id == template.id) {
            return Err(DomainError::conflict("daily_mission_templates", template.id));
        }
        state.templates.push(template.clone());
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> DomainResult<Option<DailyMissionTemplate>> {
        Ok(self.state.read().await.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn list_active_templates(&self) -> DomainResult<Vec<DailyMissionTemplate>> {
        Ok(self
            .state
            .read()
            .await
            .templates
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn list_assignments(&self, user_id: Uuid, date: NaiveDate) -> DomainResult<Vec<DailyMissionAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.assigned_date == date)
            .cloned()
            .collect())
    }

    async fn insert_assignments(&self, assignments: &[DailyMissionAssignment]) -> DomainResult<()> {
        let mut state = self.state.write().await;
        for new in assignments {
            if state
                .assignments
                .iter()
                .any(|a| a.user_id == new.user_id && a.assigned_date == new.assigned_date)
            {
                return Err(DomainError::conflict(
                    "daily_missions",
                    format!("{}:{}", new.user_id, new.assigned_date),
                ));
            }
        }
        state.assignments.extend(assignments.iter().cloned());
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> DomainResult<Option<DailyMissionAssignment>> {
        Ok(self.state.read().await.assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn transition_assignment(&self, transition: &AssignmentTransition) -> DomainResult<bool> {
        let mut state = self.state.write().await;
        let Some(assignment) = state.assignments.iter_mut().find(|a| {
            a.id == transition.assignment_id
                && a.user_id == transition.user_id
                && a.status == transition.from
        }) else {
            return Ok(false);
        };
        assignment.status = transition.to;
        if let Some(progress) = &transition.progress {
            assignment.progress = progress.clone();
        }
        if transition.completed_at.is_some() {
            assignment.completed_at = transition.completed_at;
        }
        Ok(true)
    }

    async fn assignment_counts(&self, user_id: Uuid) -> DomainResult<(u64, u64)> {
        let state = self.state.read().await;
        let mine = state.assignments.iter().filter(|a| a.user_id == user_id);
        let (assigned, completed) = mine.fold((0u64, 0u64), |(total, done), a| {
            (total + 1, done + u64::from(a.status == AssignmentStatus::Completed))
        });
        Ok((assigned, completed))
    }
}

#[async_trait]
impl ReferralRepository for InMemoryStore {
    async fn create_referral(&self, referral: &Referral) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if state
            .referrals
            .iter()
            .any(|r| r.referrer_id == referral.referrer_id && r.referee_phone == referral.referee_phone)
        {
            return Err(DomainError::conflict(
                "referrals",
                format!("{}:{}", referral.referrer_id, referral.referee_phone),
            ));
        }
        state.referrals.push(referral.clone());
        Ok(())
    }

    async fn referral_exists(&self, referrer_id: Uuid, referee_phone: &str) -> DomainResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .referrals
            .iter()
            .any(|r| r.referrer_id == referrer_id && r.referee_phone == referee_phone))
    }

    async fn verify_by_phone(&self, referee_phone: &str, verified_at: DateTime<Utc>) -> DomainResult<Vec<Referral>> {
        let mut state = self.state.write().await;
        let mut flipped = Vec::new();
        for referral in state
            .referrals
            .iter_mut()
            .filter(|r| r.referee_phone == referee_phone && !r.is_verified)
        {
            referral.is_verified = true;
            referral.verified_at = Some(verified_at);
            flipped.push(referral.clone());
        }
        Ok(flipped)
    }

    async fn verified_referrers(&self, referee_phone: &str) -> DomainResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut referrers = Vec::new();
        for referral in state
            .referrals
            .iter()
            .filter(|r| r.referee_phone == referee_phone && r.is_verified)
        {
            if !referrers.contains(&referral.referrer_id) {
                referrers.push(referral.referrer_id);
            }
        }
        Ok(referrers)
    }

    async fn count_verified(&self, referrer_id: Uuid) -> DomainResult<u64> {
        Ok(self
            .state
            .read()
            .await
            .referrals
            .iter()
            .filter(|r| r.referrer_id == referrer_id && r.is_verified)
            .count() as u64)
    }

    async fn list_referrals(&self, referrer_id: Uuid) -> DomainResult<Vec<Referral>> {
        let state = self.state.read().await;
        let mut referrals: Vec<Referral> = state
            .referrals
            .iter()
            .filter(|r| r.referrer_id == referrer_id)
            .cloned()
            .collect();
        referrals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(referrals)
    }
}

#[async_trait]
impl ParticipationRepository for InMemoryStore {
    async fn create_participation(&self, participation: &MissionParticipation) -> DomainResult<()> {
        let mut state = self.state.write().await;
        if state.participations.iter().any(|p| p.id == participation.id) {
            return Err(DomainError::conflict("mission_participations", participation.id));
        }
        state.participations.push(participation.clone());
        Ok(())
    }

    async fn get_participation(&self, id: Uuid) -> DomainResult<Option<MissionParticipation>> {
        Ok(self
            .state
            .read()
            .await
            .participations
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_active_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>> {
        Ok(self
            .state
            .read()
            .await
            .participations
            .iter()
            .filter(|p| p.user_id == user_id && p.mission_type == mission_type && p.status.is_active())
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_latest_participation(
        &self,
        user_id: Uuid,
        mission_type: MissionType,
    ) -> DomainResult<Option<MissionParticipation>> {
        Ok(self
            .state
            .read()
            .await
            .participations
            .iter()
            .filter(|p| p.user_id == user_id && p.mission_type == mission_type)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn complete_participation(
        &self,
        id: Uuid,
        expected_status: ParticipationStatus,
        proof_data: &Value,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut state = self.state.write().await;
        if state.failing_participations.contains(&id) {
            return Err(DomainError::UpstreamUnavailable(
                "participation store unavailable".to_string(),
            ));
        }
        let Some(participation) = state
            .participations
            .iter_mut()
            .find(|p| p.id == id && p.status == expected_status)
        else {
            return Ok(false);
        };
        participation.status = ParticipationStatus::Completed;
        participation.proof_data = proof_data.clone();
        participation.completed_at = Some(completed_at);
        Ok(true)
    }
}

#[async_trait]
impl ActivityRepository for InMemoryStore {
    async fn record_event(&self, event: &ActivityEvent) -> DomainResult<()> {
        self.state.write().await.events.push(event.clone());
        Ok(())
    }

    async fn count_events(&self, user_id: Uuid, kind: EventKind, filter: &Map<String, Value>) -> DomainResult<u64> {
        Ok(self
            .state
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.user_id == user_id && e.kind == kind && e.matches(filter))
            .count() as u64)
    }

    async fn has_event_between(&self, user_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .events
            .iter()
            .any(|e| e.user_id == user_id && e.occurred_at >= start && e.occurred_at <= end))
    }

    async fn streak_count(&self, user_id: Uuid, streak_type: &str) -> DomainResult<u32> {
        let state = self.state.read().await;
        if streak_type == DAILY_LOGIN_STREAK {
            return Ok(state.users.get(&user_id).map_or(0, |u| u.consecutive_days));
        }
        Ok(state
            .named_streaks
            .get(&(user_id, streak_type.to_string()))
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl RewardIssuer for InMemoryStore {
    async fn grant_experience(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome> {
        self.check_rewards_available()?;
        let mut state = self.state.write().await;
        if state.grant_keys.contains(idempotency_key) {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(DomainError::UserNotFound(user_id))?;

        let change = apply_experience(user.experience_points, amount);
        user.experience_points = change.total_xp;
        user.level = change.new_level;

        state.grant_keys.insert(idempotency_key.to_string());
        state.ledger.push(LedgerEntry {
            user_id,
            reason,
            xp_delta: i64::from(amount),
            coin_delta: 0,
        });
        for (level, bonus) in &change.bonuses {
            state.grant_keys.insert(format!("level_bonus:{user_id}:{level}"));
            state.ledger.push(LedgerEntry {
                user_id,
                reason: RewardReason::LevelUpBonus,
                xp_delta: i64::from(*bonus),
                coin_delta: 0,
            });
        }
        if change.leveled_up() {
            state.notifications.push(Notification::new(
                user_id,
                NotificationKind::LevelUp,
                serde_json::json!({ "newLevel": change.new_level }),
            ));
        }
        Ok(GrantOutcome::Granted)
    }

    async fn grant_coins(
        &self,
        user_id: Uuid,
        amount: u32,
        reason: RewardReason,
        idempotency_key: &str,
    ) -> DomainResult<GrantOutcome> {
        self.check_rewards_available()?;
        let mut state = self.state.write().await;
        if state.grant_keys.contains(idempotency_key) {
            return Ok(GrantOutcome::AlreadyGranted);
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(DomainError::UserNotFound(user_id))?;
        user.coins += i64::from(amount);

        state.grant_keys.insert(idempotency_key.to_string());
        state.ledger.push(LedgerEntry {
            user_id,
            reason,
            xp_delta: 0,
            coin_delta: i64::from(amount),
        });
        Ok(GrantOutcome::Granted)
    }

    async fn debit_coins(&self, user_id: Uuid, amount: u32, reason: RewardReason) -> DomainResult<i64> {
        self.check_rewards_available()?;
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(DomainError::UserNotFound(user_id))?;
        let cost = i64::from(amount);
        if user.coins < cost {
            return Err(DomainError::ValidationFailed(format!(
                "insufficient coins: balance {} is below cost {}",
                user.coins, cost
            )));
        }
        user.coins -= cost;
        let balance = user.coins;
        state.ledger.push(LedgerEntry {
            user_id,
            reason,
            xp_delta: 0,
            coin_delta: -cost,
        });
        Ok(balance)
    }

    async fn create_notification(&self, user_id: Uuid, kind: NotificationKind, payload: Value) -> DomainResult<()> {
        self.check_rewards_available()?;
        self.state
            .write()
            .await
            .notifications
            .push(Notification::new(user_id, kind, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_check_in_is_guarded_by_previous_date() {
        let store = InMemoryStore::new();
        let user = User::new("Park", "010-1111-2222");
        store.create_user(&user).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(store.update_check_in(user.id, None, 1, day).await.unwrap());
        // Stale expectation loses.
        assert!(!store.update_check_in(user.id, None, 1, day).await.unwrap());

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.consecutive_days, 1);
        assert_eq!(stored.last_check_in, Some(day));
    }

    #[tokio::test]
    async fn test_assignment_batch_is_write_once() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let first = vec![DailyMissionAssignment::new(user_id, Uuid::new_v4(), day)];
        let second = vec![DailyMissionAssignment::new(user_id, Uuid::new_v4(), day)];

        store.insert_assignments(&first).await.unwrap();
        let err = store.insert_assignments(&second).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));
        assert_eq!(store.list_assignments(user_id, day).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_grant_is_idempotent_per_key() {
        let store = InMemoryStore::new();
        let user = User::new("Choi", "010");
        store.create_user(&user).await.unwrap();

        let first = store
            .grant_experience(user.id, 30, RewardReason::StreakMilestone, "k1")
            .await
            .unwrap();
        let second = store
            .grant_experience(user.id, 30, RewardReason::StreakMilestone, "k1")
            .await
            .unwrap();

        assert_eq!(first, GrantOutcome::Granted);
        assert_eq!(second, GrantOutcome::AlreadyGranted);
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().experience_points, 30);
    }

    #[tokio::test]
    async fn test_debit_rejects_insufficient_balance() {
        let store = InMemoryStore::new();
        let user = User::new("Jung", "010").with_coins(40);
        store.create_user(&user).await.unwrap();

        let err = store
            .debit_coins(user.id, 100, RewardReason::DailyMissionSkip)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().coins, 40);

        let balance = store
            .debit_coins(user.id, 40, RewardReason::DailyMissionSkip)
            .await
            .unwrap();
        assert_eq!(balance, 0);
    }

    #[tokio::test]
    async fn test_count_events_applies_filter() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .record_event(&ActivityEvent::new(user_id, EventKind::MissionCompleted).with_attribute("mission_type", "review"))
            .await
            .unwrap();
        store
            .record_event(&ActivityEvent::new(user_id, EventKind::MissionCompleted).with_attribute("mission_type", "sns"))
            .await
            .unwrap();

        let mut filter = Map::new();
        assert_eq!(store.count_events(user_id, EventKind::MissionCompleted, &filter).await.unwrap(), 2);
        filter.insert("mission_type".into(), json!("review"));
        assert_eq!(store.count_events(user_id, EventKind::MissionCompleted, &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reward_failure_injection() {
        let store = InMemoryStore::new();
        let user = User::new("Han", "010");
        store.create_user(&user).await.unwrap();
        store.set_reward_failure(true);

        let err = store
            .grant_coins(user.id, 10, RewardReason::DailyMissionComplete, "k")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
