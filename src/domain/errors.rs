//! Domain errors for the questline rules engine.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a [`DomainError`], used by callers to decide
/// whether to retry, report, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced user, badge, template, assignment or participation is missing.
    NotFound,
    /// The request or stored configuration is malformed or not allowed.
    Validation,
    /// A guarded write lost a race against a concurrent writer.
    Conflict,
    /// The record store or reward issuer failed or timed out.
    UpstreamUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

/// Domain-level errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Badge not found: {0}")]
    BadgeNotFound(Uuid),

    #[error("Daily mission template not found: {0}")]
    TemplateNotFound(Uuid),

    #[error("Daily mission assignment not found: {0}")]
    AssignmentNotFound(Uuid),

    #[error("Mission participation not found: {0}")]
    ParticipationNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Shorthand for a conflict on a guarded write.
    pub fn conflict(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::ConcurrencyConflict {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_)
            | Self::BadgeNotFound(_)
            | Self::TemplateNotFound(_)
            | Self::AssignmentNotFound(_)
            | Self::ParticipationNotFound(_) => ErrorKind::NotFound,
            Self::ValidationFailed(_)
            | Self::InvalidStateTransition { .. }
            | Self::SerializationError(_) => ErrorKind::Validation,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    /// Conflicts may be retried once with fresh reads; upstream failures are
    /// retryable by the caller. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::UpstreamUnavailable
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let entity = db_err.table().unwrap_or("record").to_string();
                return DomainError::ConcurrencyConflict {
                    entity,
                    id: db_err.message().to_string(),
                };
            }
        }
        DomainError::UpstreamUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DomainError::UserNotFound(Uuid::new_v4()).kind(), ErrorKind::NotFound);
        assert_eq!(
            DomainError::ValidationFailed("dup".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(DomainError::conflict("users", "u1").kind(), ErrorKind::Conflict);
        assert_eq!(
            DomainError::UpstreamUnavailable("timeout".into()).kind(),
            ErrorKind::UpstreamUnavailable
        );
    }

    #[test]
    fn test_retryable() {
        assert!(DomainError::conflict("users", "u1").is_retryable());
        assert!(DomainError::UpstreamUnavailable("down".into()).is_retryable());
        assert!(!DomainError::BadgeNotFound(Uuid::new_v4()).is_retryable());
        assert!(!DomainError::ValidationFailed("bad".into()).is_retryable());
    }

    #[test]
    fn test_sqlx_non_database_error_is_upstream() {
        let err: DomainError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }
}
