//! Consecutive-day attendance tracking.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActivityEvent, EventKind, NotificationKind, RewardReason, RulesConfig};
use crate::domain::ports::{RecordStore, RewardIssuer};

/// Result of one check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub consecutive_days: u32,
    /// Bonus XP when this check-in landed on a milestone.
    pub milestone_bonus: Option<u32>,
    /// The user had already checked in today; nothing changed.
    pub already_checked_in: bool,
}

/// Next streak counter given the previous check-in. `None` means no change.
pub fn next_streak(last_check_in: Option<NaiveDate>, consecutive_days: u32, today: NaiveDate) -> Option<u32> {
    let Some(last) = last_check_in else {
        return Some(1);
    };
    match (today - last).num_days() {
        d if d <= 0 => None,
        1 => Some(consecutive_days.saturating_add(1)),
        _ => Some(1),
    }
}

pub struct StreakTracker<S: RecordStore, R: RewardIssuer> {
    store: Arc<S>,
    rewards: Arc<R>,
    rules: RulesConfig,
}

impl<S: RecordStore, R: RewardIssuer> StreakTracker<S, R> {
    pub fn new(store: Arc<S>, rewards: Arc<R>, rules: RulesConfig) -> Self {
        Self { store, rewards, rules }
    }

    pub async fn record_check_in(&self, user_id: Uuid) -> DomainResult<CheckInOutcome> {
        self.record_check_in_at(user_id, Utc::now()).await
    }

    /// Record a check-in as of `now` (UTC calendar day).
    #[instrument(skip(self), fields(date = %now.date_naive()))]
    pub async fn record_check_in_at(&self, user_id: Uuid, now: DateTime<Utc>) -> DomainResult<CheckInOutcome> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?;
        let today = now.date_naive();

        let Some(days) = next_streak(user.last_check_in, user.consecutive_days, today) else {
            debug!(%user_id, last_check_in = ?user.last_check_in, "already checked in");
            return Ok(CheckInOutcome {
                consecutive_days: user.consecutive_days,
                milestone_bonus: None,
                already_checked_in: true,
            });
        };

        let applied = self
            .store
            .update_check_in(user_id, user.last_check_in, days, today)
            .await?;
        if !applied {
            warn!(%user_id, "check-in lost a concurrent update");
            return Err(DomainError::conflict("users", user_id));
        }
        info!(%user_id, consecutive_days = days, "check-in recorded");

        let event = ActivityEvent::new(user_id, EventKind::CheckIn)
            .with_attribute("consecutive_days", days)
            .at(now);
        if let Err(e) = self.store.record_event(&event).await {
            warn!(%user_id, error = %e, "failed to record check-in activity");
        }

        let milestone_bonus = self.rules.milestone_bonus(days);
        if let Some(bonus) = milestone_bonus {
            self.grant_milestone(user_id, today, days, bonus).await;
        }

        Ok(CheckInOutcome {
            consecutive_days: days,
            milestone_bonus,
            already_checked_in: false,
        })
    }

    async fn grant_milestone(&self, user_id: Uuid, today: NaiveDate, days: u32, bonus: u32) {
        let key = format!("streak_milestone:{user_id}:{today}:{days}");
        match self
            .rewards
            .grant_experience(user_id, bonus, RewardReason::StreakMilestone, &key)
            .await
        {
            Ok(outcome) if outcome.is_granted() => {
                info!(%user_id, days, bonus, "streak milestone reached");
                let payload = json!({ "consecutiveDays": days, "bonusXp": bonus });
                if let Err(e) = self
                    .rewards
                    .create_notification(user_id, NotificationKind::StreakMilestone, payload)
                    .await
                {
                    warn!(%user_id, error = %e, "failed to notify streak milestone");
                }
            }
            Ok(_) => debug!(%user_id, %key, "streak milestone already granted"),
            Err(e) => warn!(%user_id, %key, error = %e, "failed to grant streak milestone"),
        }
    }
}
