//! Activity repository port.
//!
//! Read side of badge conditions: event counts, time windows and named streaks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActivityEvent, EventKind};

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Record an activity event.
    async fn record_event(&self, event: &ActivityEvent) -> DomainResult<()>;

    /// Count a user's events of `kind` whose attributes equal every filter entry.
    async fn count_events(&self, user_id: Uuid, kind: EventKind, filter: &Map<String, Value>) -> DomainResult<u64>;

    /// Whether the user has any event in the inclusive window.
    async fn has_event_between(&self, user_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<bool>;

    /// Current counter of a named streak; 0 when unknown.
    ///
    /// `daily_login` resolves to the user's consecutive check-in counter.
    async fn streak_count(&self, user_id: Uuid, streak_type: &str) -> DomainResult<u32>;
}
