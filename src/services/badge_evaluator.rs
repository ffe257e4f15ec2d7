//! Badge progress evaluation.
//!
//! Progress is derived from the condition tree, then persisted as
//! `max(stored, computed)` with a compare-and-set on the stored value. The
//! first write that reaches 100 stamps `unlocked_at` and emits the single
//! `badge_unlock` notification.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, ErrorKind};
use crate::domain::models::{
    scaled_progress, Badge, BadgeCondition, BadgeWithProgress, NotificationKind, RulesConfig, User,
    UserBadgeProgress, FULL_PROGRESS,
};
use crate::domain::ports::{RecordStore, RewardIssuer};

/// Result of evaluating one badge for one user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BadgeEvaluation {
    pub badge_id: Uuid,
    /// Persisted progress after this evaluation.
    pub progress: f64,
    pub unlocked: bool,
    /// True only for the evaluation that performed the unlock.
    pub newly_unlocked: bool,
}

pub struct BadgeEvaluator<S: RecordStore, R: RewardIssuer> {
    store: Arc<S>,
    rewards: Arc<R>,
    rules: RulesConfig,
}

impl<S: RecordStore, R: RewardIssuer> BadgeEvaluator<S, R> {
    pub fn new(store: Arc<S>, rewards: Arc<R>, rules: RulesConfig) -> Self {
        Self { store, rewards, rules }
    }

    /// Compute progress of a condition without persisting anything.
    pub async fn progress_of(&self, user_id: Uuid, condition: &BadgeCondition) -> DomainResult<f64> {
        let user = self.load_user(user_id).await?;
        self.compute(&user, condition).await
    }

    pub async fn evaluate(&self, user_id: Uuid, badge: &Badge) -> DomainResult<BadgeEvaluation> {
        self.evaluate_at(user_id, badge, Utc::now()).await
    }

    /// Evaluate a badge looked up by ID.
    pub async fn evaluate_by_id(&self, user_id: Uuid, badge_id: Uuid) -> DomainResult<BadgeEvaluation> {
        let badge = self
            .store
            .get_badge(badge_id)
            .await?
            .ok_or(DomainError::BadgeNotFound(badge_id))?;
        self.evaluate(user_id, &badge).await
    }

    #[instrument(skip(self, badge), fields(badge_id = %badge.id, badge = %badge.name))]
    pub async fn evaluate_at(
        &self,
        user_id: Uuid,
        badge: &Badge,
        now: DateTime<Utc>,
    ) -> DomainResult<BadgeEvaluation> {
        let user = self.load_user(user_id).await?;
        self.evaluate_for(&user, badge, now).await
    }

    pub async fn evaluate_all(&self, user_id: Uuid) -> DomainResult<Vec<BadgeEvaluation>> {
        self.evaluate_all_at(user_id, Utc::now()).await
    }

    /// Evaluate every active badge.
    ///
    /// A badge whose stored condition is invalid is logged and skipped.
    #[instrument(skip(self))]
    pub async fn evaluate_all_at(&self, user_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<BadgeEvaluation>> {
        let user = self.load_user(user_id).await?;
        let badges = self.store.list_active_badges().await?;

        let mut evaluations = Vec::with_capacity(badges.len());
        for badge in &badges {
            match self.evaluate_for(&user, badge, now).await {
                Ok(evaluation) => evaluations.push(evaluation),
                Err(e) if e.kind() == ErrorKind::Validation => {
                    warn!(badge_id = %badge.id, error = %e, "skipping badge with invalid condition");
                }
                Err(e) => return Err(e),
            }
        }

        let unlocked = evaluations.iter().filter(|e| e.newly_unlocked).count();
        debug!(%user_id, evaluated = evaluations.len(), unlocked, "badges evaluated");
        Ok(evaluations)
    }

    /// Active badges joined with stored progress.
    pub async fn list_with_progress(&self, user_id: Uuid) -> DomainResult<Vec<BadgeWithProgress>> {
        self.load_user(user_id).await?;
        let badges = self.store.list_active_badges().await?;
        let mut stored: HashMap<Uuid, UserBadgeProgress> = self
            .store
            .list_progress(user_id)
            .await?
            .into_iter()
            .map(|p| (p.badge_id, p))
            .collect();

        Ok(badges
            .into_iter()
            .map(|badge| {
                let row = stored.remove(&badge.id);
                let progress = row.as_ref().map_or(0.0, |p| p.progress);
                BadgeWithProgress {
                    is_unlocked: row.as_ref().is_some_and(UserBadgeProgress::is_unlocked),
                    unlocked_at: row.and_then(|p| p.unlocked_at),
                    progress,
                    badge,
                }
            })
            .collect())
    }

    async fn load_user(&self, user_id: Uuid) -> DomainResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))
    }

    async fn evaluate_for(&self, user: &User, badge: &Badge, now: DateTime<Utc>) -> DomainResult<BadgeEvaluation> {
        let computed = self.compute(user, &badge.condition).await?;
        let stored = self.store.get_progress(user.id, badge.id).await?;

        let evaluation = match stored {
            None => self.insert_first(user.id, badge.id, computed, now).await?,
            Some(previous) => self.raise(previous, computed, now).await?,
        };

        debug!(
            user_id = %user.id,
            badge_id = %badge.id,
            computed,
            progress = evaluation.progress,
            "badge evaluated"
        );

        if evaluation.newly_unlocked {
            info!(user_id = %user.id, badge_id = %badge.id, badge = %badge.name, "badge unlocked");
            let payload = json!({
                "badgeId": badge.id,
                "badgeName": badge.name,
                "rarity": badge.rarity.as_str(),
            });
            if let Err(e) = self
                .rewards
                .create_notification(user.id, NotificationKind::BadgeUnlock, payload)
                .await
            {
                warn!(user_id = %user.id, badge_id = %badge.id, error = %e, "failed to notify badge unlock");
            }
        }

        Ok(evaluation)
    }

    async fn insert_first(
        &self,
        user_id: Uuid,
        badge_id: Uuid,
        computed: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<BadgeEvaluation> {
        if computed <= 0.0 {
            return Ok(BadgeEvaluation {
                badge_id,
                progress: 0.0,
                unlocked: false,
                newly_unlocked: false,
            });
        }

        let unlocked = computed >= FULL_PROGRESS;
        let row = UserBadgeProgress {
            user_id,
            badge_id,
            progress: computed,
            unlocked_at: unlocked.then_some(now),
            updated_at: now,
        };
        self.store.insert_progress(&row).await?;

        Ok(BadgeEvaluation {
            badge_id,
            progress: computed,
            unlocked,
            newly_unlocked: unlocked,
        })
    }

    async fn raise(
        &self,
        previous: UserBadgeProgress,
        computed: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<BadgeEvaluation> {
        let was_unlocked = previous.is_unlocked();
        let progress = if was_unlocked {
            FULL_PROGRESS
        } else {
            previous.progress.max(computed)
        };

        if progress <= previous.progress {
            return Ok(BadgeEvaluation {
                badge_id: previous.badge_id,
                progress: previous.progress,
                unlocked: was_unlocked,
                newly_unlocked: false,
            });
        }

        let unlocked = progress >= FULL_PROGRESS;
        let newly_unlocked = unlocked && !was_unlocked;
        let row = UserBadgeProgress {
            progress,
            unlocked_at: previous.unlocked_at.or_else(|| unlocked.then_some(now)),
            updated_at: now,
            ..previous.clone()
        };

        if !self.store.update_progress(&row, previous.progress).await? {
            warn!(user_id = %row.user_id, badge_id = %row.badge_id, "badge progress lost a concurrent update");
            return Err(DomainError::conflict(
                "user_badges",
                format!("{}:{}", row.user_id, row.badge_id),
            ));
        }

        Ok(BadgeEvaluation {
            badge_id: row.badge_id,
            progress,
            unlocked,
            newly_unlocked,
        })
    }

    /// Leaf values are fetched in tree order, then folded back up so a
    /// combination is the plain mean of its children.
    async fn compute(&self, user: &User, condition: &BadgeCondition) -> DomainResult<f64> {
        condition
            .validate_with_max_depth(self.rules.max_condition_depth)
            .map_err(DomainError::ValidationFailed)?;

        let mut leaves = Vec::new();
        collect_leaves(condition, &mut leaves);

        let mut values = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            values.push(self.leaf_progress(user, leaf).await?);
        }

        let mut values = values.into_iter();
        Ok(fold_progress(condition, &mut values).min(FULL_PROGRESS))
    }

    async fn leaf_progress(&self, user: &User, leaf: &BadgeCondition) -> DomainResult<f64> {
        let progress = match leaf {
            BadgeCondition::Count(c) => {
                let count = self.store.count_events(user.id, c.event, &c.filter).await?;
                scaled_progress(count as f64, c.threshold)
            }
            BadgeCondition::Streak(c) => {
                let streak = self.store.streak_count(user.id, &c.streak_type).await?;
                scaled_progress(f64::from(streak), c.threshold)
            }
            BadgeCondition::Level(c) => scaled_progress(f64::from(user.level), c.threshold),
            BadgeCondition::TimeBased(c) => {
                if self.store.has_event_between(user.id, c.time_start, c.time_end).await? {
                    FULL_PROGRESS
                } else {
                    0.0
                }
            }
            BadgeCondition::Combination(_) => 0.0,
        };
        Ok(progress)
    }
}

fn collect_leaves<'a>(condition: &'a BadgeCondition, out: &mut Vec<&'a BadgeCondition>) {
    match condition {
        BadgeCondition::Combination(c) => c.conditions.iter().for_each(|sub| collect_leaves(sub, out)),
        leaf => out.push(leaf),
    }
}

fn fold_progress(condition: &BadgeCondition, values: &mut impl Iterator<Item = f64>) -> f64 {
    match condition {
        BadgeCondition::Combination(c) => {
            let sum: f64 = c.conditions.iter().map(|sub| fold_progress(sub, values)).sum();
            sum / c.conditions.len() as f64
        }
        _ => values.next().unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::models::{ActivityEvent, EventKind, DAILY_LOGIN_STREAK};
    use crate::domain::ports::{ActivityRepository, BadgeRepository, UserRepository};
    use chrono::TimeZone;
    use serde_json::Map;

    async fn setup(user: &User) -> (Arc<InMemoryStore>, BadgeEvaluator<InMemoryStore, InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.create_user(user).await.unwrap();
        let evaluator = BadgeEvaluator::new(store.clone(), store.clone(), RulesConfig::default());
        (store, evaluator)
    }

    async fn record(store: &InMemoryStore, user_id: Uuid, kind: EventKind, times: usize) {
        for _ in 0..times {
            store.record_event(&ActivityEvent::new(user_id, kind)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_count_progress() {
        let user = User::new("Yoon", "010");
        let (store, evaluator) = setup(&user).await;
        record(&store, user.id, EventKind::PostCreated, 3).await;

        let condition = BadgeCondition::count(EventKind::PostCreated, 4);
        let progress = evaluator.progress_of(user.id, &condition).await.unwrap();
        assert!((progress - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_combination_averages_children() {
        let user = User::new("Yoon", "010").with_experience(100);
        let (store, evaluator) = setup(&user).await;
        record(&store, user.id, EventKind::ReviewWritten, 1).await;

        // level 2 of 4 -> 50, reviews 1 of 2 -> 50
        let condition = BadgeCondition::combination(vec![
            BadgeCondition::level(4),
            BadgeCondition::count(EventKind::ReviewWritten, 2),
        ]);
        let progress = evaluator.progress_of(user.id, &condition).await.unwrap();
        assert!((progress - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nested_combination_of_complete_children_is_full() {
        let user = User::new("Yoon", "010").with_experience(500);
        let (_, evaluator) = setup(&user).await;

        let condition = BadgeCondition::combination(vec![
            BadgeCondition::level(2),
            BadgeCondition::combination(vec![BadgeCondition::level(3), BadgeCondition::level(6)]),
            BadgeCondition::level(1),
        ]);
        let progress = evaluator.progress_of(user.id, &condition).await.unwrap();
        assert!((progress - FULL_PROGRESS).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_too_deep_condition_is_rejected() {
        let user = User::new("Yoon", "010");
        let (_, evaluator) = setup(&user).await;

        let mut condition = BadgeCondition::level(1);
        for _ in 0..4 {
            condition = BadgeCondition::combination(vec![condition]);
        }
        let err = evaluator.progress_of(user.id, &condition).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_time_window_is_binary() {
        let user = User::new("Yoon", "010");
        let (store, evaluator) = setup(&user).await;
        let start = Utc.with_ymd_and_hms(2024, 12, 24, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 12, 25, 23, 59, 59).unwrap();
        let condition = BadgeCondition::time_based(start, end);

        assert!(evaluator.progress_of(user.id, &condition).await.unwrap().abs() < f64::EPSILON);
        store
            .record_event(&ActivityEvent::new(user.id, EventKind::Activity).at(end))
            .await
            .unwrap();
        assert!((evaluator.progress_of(user.id, &condition).await.unwrap() - FULL_PROGRESS).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_streak_condition_reads_named_and_login_streaks() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let user = User::new("Yoon", "010").with_streak(3, today);
        let (store, evaluator) = setup(&user).await;
        store.set_streak(user.id, "weekly_review", 1).await;

        let login = BadgeCondition::streak(DAILY_LOGIN_STREAK, 6);
        assert!((evaluator.progress_of(user.id, &login).await.unwrap() - 50.0).abs() < 1e-9);

        let weekly = BadgeCondition::streak("weekly_review", 4);
        assert!((evaluator.progress_of(user.id, &weekly).await.unwrap() - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unlock_happens_once() {
        let user = User::new("Yoon", "010");
        let (store, evaluator) = setup(&user).await;
        let badge = Badge::new("Chatterbox", BadgeCondition::count(EventKind::PostCreated, 2));
        store.create_badge(&badge).await.unwrap();

        record(&store, user.id, EventKind::PostCreated, 1).await;
        let first = evaluator.evaluate(user.id, &badge).await.unwrap();
        assert!(!first.unlocked);

        record(&store, user.id, EventKind::PostCreated, 1).await;
        let second = evaluator.evaluate(user.id, &badge).await.unwrap();
        assert!(second.newly_unlocked);

        record(&store, user.id, EventKind::PostCreated, 3).await;
        let third = evaluator.evaluate(user.id, &badge).await.unwrap();
        assert!(third.unlocked);
        assert!(!third.newly_unlocked);

        let unlocks = store
            .notifications_for(user.id)
            .await
            .into_iter()
            .filter(|n| n.kind == NotificationKind::BadgeUnlock)
            .count();
        assert_eq!(unlocks, 1);
    }

    #[tokio::test]
    async fn test_stored_progress_never_decreases() {
        let user = User::new("Yoon", "010");
        let (store, evaluator) = setup(&user).await;
        let mut filter = Map::new();
        filter.insert("mission_type".into(), json!("review"));
        let badge = Badge::new("Critic", BadgeCondition::count_filtered(EventKind::MissionCompleted, 4, filter));
        store.create_badge(&badge).await.unwrap();

        store
            .insert_progress(&UserBadgeProgress {
                user_id: user.id,
                badge_id: badge.id,
                progress: 60.0,
                unlocked_at: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let evaluation = evaluator.evaluate(user.id, &badge).await.unwrap();
        assert!((evaluation.progress - 60.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_list_with_progress_defaults_to_zero() {
        let user = User::new("Yoon", "010").with_experience(300);
        let (store, evaluator) = setup(&user).await;
        let done = Badge::new("Level 2", BadgeCondition::level(2)).with_category("level");
        let open = Badge::new("Writer", BadgeCondition::count(EventKind::PostCreated, 10)).with_category("social");
        store.create_badge(&done).await.unwrap();
        store.create_badge(&open).await.unwrap();

        evaluator.evaluate_all(user.id).await.unwrap();
        let listed = evaluator.list_with_progress(user.id).await.unwrap();

        assert_eq!(listed.len(), 2);
        let level = listed.iter().find(|b| b.badge.id == done.id).unwrap();
        assert!(level.is_unlocked);
        assert!(level.unlocked_at.is_some());
        let writer = listed.iter().find(|b| b.badge.id == open.id).unwrap();
        assert!(writer.progress.abs() < f64::EPSILON);
        assert!(!writer.is_unlocked);
    }

    #[tokio::test]
    async fn test_missing_badge_and_user() {
        let user = User::new("Yoon", "010");
        let (_, evaluator) = setup(&user).await;

        let err = evaluator.evaluate_by_id(user.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::BadgeNotFound(_)));

        let err = evaluator.evaluate_all(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::UserNotFound(_)));
    }
}
