use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BehaviorReview, CardInteraction, Match, MatchNotification, MatchResult, MatchStatus, MutualMatch,
    ParticipantStatus, ReputationScore, SkillAccuracyRecord, SkillLevelChange, SkillLevelRecord, SkillLevelState,
    UserPrivacySettings,
};

/// Errors raised by a persistence backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Mutation applied to a reputation row while the backend holds its lock
pub type ReputationMutation = Box<dyn FnOnce(&mut ReputationScore) + Send>;

/// Decides a skill level change from the current state, under the user's lock.
/// Returning `None` leaves the level untouched and writes no record.
pub type SkillLevelAdjustment = Box<dyn FnOnce(SkillLevelState) -> Option<SkillLevelChange> + Send>;

/// Transactional persistence for every entity the engine owns.
///
/// Operations that must be atomic (mutual-match creation, reputation and
/// skill-level read-modify-write, result confirmation) are single calls so
/// each backend can implement them with its own locking.
#[async_trait]
pub trait Store: Send + Sync {
    /// Record a swipe. An existing unmatched row for the same pair takes the
    /// new action; a matched row is returned unchanged.
    async fn upsert_card_interaction(&self, interaction: CardInteraction) -> StoreResult<CardInteraction>;

    async fn find_card_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<CardInteraction>>;

    /// Atomically turn two reciprocal likes into a match, chat room and
    /// notifications. Locks both rows in pair-key order.
    ///
    /// Returns the existing match (`created == false`) if the pair was
    /// already matched, or `None` if the rows are no longer mutual likes.
    async fn create_mutual_match(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<MutualMatch>>;

    async fn insert_match(&self, game: &Match) -> StoreResult<()>;

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>>;

    async fn update_match_status(&self, match_id: Uuid, status: MatchStatus) -> StoreResult<Match>;

    /// Move an invitee from `invited` to `status`. `NotFound` if the user is
    /// not on the match; `Conflict` if they already answered differently.
    /// Answering the same way twice returns the match unchanged.
    async fn set_participant_status(
        &self,
        match_id: Uuid,
        user_id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Match>;

    /// Matches the user takes part in, newest first
    async fn matches_for_user(&self, user_id: &str) -> StoreResult<Vec<Match>>;

    /// Fails with `Conflict` if the match already has a result
    async fn insert_match_result(&self, result: &MatchResult) -> StoreResult<()>;

    async fn get_match_result(&self, match_id: Uuid) -> StoreResult<Option<MatchResult>>;

    /// Add `user_id` to the confirmers (idempotent). The result becomes
    /// confirmed once `required` distinct users confirmed it. The flag is
    /// true only for the call that flipped it to confirmed.
    async fn confirm_match_result(
        &self,
        match_id: Uuid,
        user_id: &str,
        required: usize,
    ) -> StoreResult<(MatchResult, bool)>;

    async fn results_for_user(&self, user_id: &str) -> StoreResult<Vec<MatchResult>>;

    /// Stored row, creating the default one on first access
    async fn get_or_create_reputation(&self, user_id: &str) -> StoreResult<ReputationScore>;

    /// Stored rows only; users without a row are absent from the map
    async fn reputation_scores(&self, user_ids: &[String]) -> StoreResult<HashMap<String, ReputationScore>>;

    /// Serialized read-modify-write of one user's reputation
    async fn modify_reputation(&self, user_id: &str, mutation: ReputationMutation) -> StoreResult<ReputationScore>;

    /// Fails with `Conflict` on a second review of the same reviewee by the
    /// same reviewer for the same match
    async fn insert_behavior_review(&self, review: &BehaviorReview) -> StoreResult<()>;

    /// Reviews received by the user, newest first
    async fn behavior_reviews_for(&self, reviewee_id: &str) -> StoreResult<Vec<BehaviorReview>>;

    async fn insert_skill_accuracy_record(&self, record: &SkillAccuracyRecord) -> StoreResult<()>;

    /// Newest first, optionally only those created after `since`
    async fn recent_skill_accuracy_records(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<SkillAccuracyRecord>>;

    async fn users_with_skill_accuracy_records(&self) -> StoreResult<Vec<String>>;

    /// Engine-tracked levels; users never adjusted are absent
    async fn skill_levels(&self, user_ids: &[String]) -> StoreResult<HashMap<String, f64>>;

    async fn skill_level_state(&self, user_id: &str) -> StoreResult<Option<SkillLevelState>>;

    /// Serialized skill level change plus its audit record. `fallback_level`
    /// seeds the state for users the engine has never adjusted.
    async fn adjust_skill_level(
        &self,
        user_id: &str,
        fallback_level: f64,
        adjust: SkillLevelAdjustment,
    ) -> StoreResult<Option<SkillLevelRecord>>;

    /// Oldest first
    async fn skill_level_history(&self, user_id: &str) -> StoreResult<Vec<SkillLevelRecord>>;

    /// Stored settings or the defaults
    async fn get_privacy_settings(&self, user_id: &str) -> StoreResult<UserPrivacySettings>;

    async fn save_privacy_settings(&self, settings: &UserPrivacySettings) -> StoreResult<UserPrivacySettings>;

    async fn insert_notifications(&self, notifications: &[MatchNotification]) -> StoreResult<()>;

    /// Newest first
    async fn notifications_for(&self, user_id: &str, unread_only: bool) -> StoreResult<Vec<MatchNotification>>;

    /// `NotFound` unless the notification exists and belongs to `user_id`
    async fn mark_notification_read(&self, notification_id: Uuid, user_id: &str) -> StoreResult<MatchNotification>;

    async fn health_check(&self) -> StoreResult<bool>;
}
