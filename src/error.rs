use std::fmt;
use thiserror::Error;

use crate::services::{ProfileError, StoreError};

/// Data guarded by a privacy switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateResource {
    ReputationScore,
    MatchHistory,
    WinLossRecord,
    SkillProgression,
    BehaviorReviews,
    DetailedStats,
    Statistics,
}

impl fmt::Display for PrivateResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrivateResource::ReputationScore => "reputation score",
            PrivateResource::MatchHistory => "match history",
            PrivateResource::WinLossRecord => "win/loss record",
            PrivateResource::SkillProgression => "skill progression",
            PrivateResource::BehaviorReviews => "behavior reviews",
            PrivateResource::DetailedStats => "detailed statistics",
            PrivateResource::Statistics => "match statistics",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the matching and reputation engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("The user's {0} is private")]
    PrivacyDenied(PrivateResource),

    #[error("User {user_id} is not a participant of match {match_id}")]
    NotParticipant { user_id: String, match_id: uuid::Uuid },

    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Profile service error: {0}")]
    Profile(ProfileError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => EngineError::Conflict(message),
            other => EngineError::Storage(other),
        }
    }
}

impl From<ProfileError> for EngineError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(user_id) => EngineError::NotFound {
                entity: "user",
                id: user_id,
            },
            other => EngineError::Profile(other),
        }
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::PrivacyDenied(_) => "privacy_denied",
            EngineError::NotParticipant { .. } => "not_participant",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Storage(_) => "storage_error",
            EngineError::Profile(_) => "profile_service_error",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_denied_names_resource() {
        let err = EngineError::PrivacyDenied(PrivateResource::MatchHistory);
        assert_eq!(err.to_string(), "The user's match history is private");
        assert_eq!(err.code(), "privacy_denied");
    }

    #[test]
    fn test_store_conflict_becomes_conflict() {
        let err: EngineError = StoreError::Conflict("duplicate review".to_string()).into();
        assert!(matches!(err, EngineError::Conflict(ref m) if m == "duplicate review"));

        let err: EngineError = StoreError::NotFound("match 1".to_string()).into();
        assert_eq!(err.code(), "storage_error");
    }

    #[test]
    fn test_missing_profile_becomes_not_found() {
        let err: EngineError = ProfileError::NotFound("ghost".to_string()).into();
        assert_eq!(err.to_string(), "Not found: user ghost");
    }

    #[test]
    fn test_not_found_message() {
        let err = EngineError::not_found("match", "abc");
        assert_eq!(err.to_string(), "Not found: match abc");
    }
}
