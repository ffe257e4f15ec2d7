//! Activity events observed by `count` and `time_based` badge conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of a recorded user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    MissionCompleted,
    FriendAdded,
    PostCreated,
    ReviewWritten,
    SnsShared,
    CheckIn,
    DailyMissionCompleted,
    ReferralVerified,
    /// Generic activity log entry.
    Activity,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissionCompleted => "MISSION_COMPLETED",
            Self::FriendAdded => "FRIEND_ADDED",
            Self::PostCreated => "POST_CREATED",
            Self::ReviewWritten => "REVIEW_WRITTEN",
            Self::SnsShared => "SNS_SHARED",
            Self::CheckIn => "CHECK_IN",
            Self::DailyMissionCompleted => "DAILY_MISSION_COMPLETED",
            Self::ReferralVerified => "REFERRAL_VERIFIED",
            Self::Activity => "ACTIVITY",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MISSION_COMPLETED" => Some(Self::MissionCompleted),
            "FRIEND_ADDED" => Some(Self::FriendAdded),
            "POST_CREATED" => Some(Self::PostCreated),
            "REVIEW_WRITTEN" => Some(Self::ReviewWritten),
            "SNS_SHARED" => Some(Self::SnsShared),
            "CHECK_IN" => Some(Self::CheckIn),
            "DAILY_MISSION_COMPLETED" => Some(Self::DailyMissionCompleted),
            "REFERRAL_VERIFIED" => Some(Self::ReferralVerified),
            "ACTIVITY" => Some(Self::Activity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: EventKind,
    /// Flat attribute object matched by equality filters.
    pub attributes: Map<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(user_id: Uuid, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            attributes: Map::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// True when every filter entry is present with an equal value.
    pub fn matches(&self, filter: &Map<String, Value>) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.attributes.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_roundtrip_names() {
        for kind in [
            EventKind::MissionCompleted,
            EventKind::SnsShared,
            EventKind::DailyMissionCompleted,
            EventKind::Activity,
        ] {
            assert_eq!(EventKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_str("nope"), None);
    }

    #[test]
    fn test_matches_filter() {
        let event = ActivityEvent::new(Uuid::new_v4(), EventKind::MissionCompleted)
            .with_attribute("mission_type", "review")
            .with_attribute("store_id", 3);

        let mut filter = Map::new();
        assert!(event.matches(&filter));

        filter.insert("mission_type".into(), json!("review"));
        assert!(event.matches(&filter));

        filter.insert("store_id".into(), json!(4));
        assert!(!event.matches(&filter));
    }
}
