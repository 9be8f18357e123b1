use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::ReputationModel;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceStatus, BehaviorReview, ReputationScore, SkillAccuracyRecord, SkillChangeReason, SkillLevelChange,
    SkillLevelRecord,
};
use crate::services::{ProfileSource, Store};

/// Post-match feedback applied to one user in a single update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationFeedback {
    pub match_completed: bool,
    pub was_on_time: bool,
    pub delay_minutes: Option<u32>,
    pub behavior_rating: Option<f64>,
}

/// Owns per-user reputation and engine-tracked skill levels.
///
/// Every update is a closure over the pure `ReputationModel`, executed by the
/// store under the user's row lock.
pub struct ReputationService {
    store: Arc<dyn Store>,
    profiles: Arc<dyn ProfileSource>,
    model: ReputationModel,
}

impl ReputationService {
    pub fn new(store: Arc<dyn Store>, profiles: Arc<dyn ProfileSource>, model: ReputationModel) -> Self {
        Self { store, profiles, model }
    }

    pub fn model(&self) -> &ReputationModel {
        &self.model
    }

    pub async fn get_reputation(&self, user_id: &str) -> EngineResult<ReputationScore> {
        Ok(self.store.get_or_create_reputation(user_id).await?)
    }

    pub async fn update_attendance(&self, user_id: &str, status: AttendanceStatus) -> EngineResult<ReputationScore> {
        let model = self.model;
        let score = self
            .store
            .modify_reputation(user_id, Box::new(move |s| model.apply_attendance(s, status)))
            .await?;
        tracing::debug!("Attendance {:?} for {}: {:.1}", status, user_id, score.attendance_rate);
        Ok(score)
    }

    pub async fn update_punctuality(
        &self,
        user_id: &str,
        on_time: bool,
        delay_minutes: Option<u32>,
    ) -> EngineResult<ReputationScore> {
        let model = self.model;
        let score = self
            .store
            .modify_reputation(user_id, Box::new(move |s| model.apply_punctuality(s, on_time)))
            .await?;
        tracing::debug!(
            "Punctuality for {} (on time: {}, delay: {:?}): {:.1}",
            user_id,
            on_time,
            delay_minutes,
            score.punctuality_score
        );
        Ok(score)
    }

    /// Append an accuracy record and fold it into the skill-accuracy sub-score
    pub async fn update_skill_accuracy(
        &self,
        user_id: &str,
        reported_level: f64,
        observed_level: f64,
        match_id: Option<Uuid>,
    ) -> EngineResult<ReputationScore> {
        for level in [reported_level, observed_level] {
            if !(1.0..=7.0).contains(&level) {
                return Err(EngineError::validation(format!("skill level {} is outside 1.0-7.0", level)));
            }
        }

        let record = SkillAccuracyRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            reported_level,
            observed_level,
            match_id,
            created_at: Utc::now(),
        };
        self.store.insert_skill_accuracy_record(&record).await?;

        let model = self.model;
        Ok(self
            .store
            .modify_reputation(
                user_id,
                Box::new(move |s| model.apply_skill_accuracy(s, reported_level, observed_level)),
            )
            .await?)
    }

    pub async fn update_behavior_rating(&self, user_id: &str, rating: f64) -> EngineResult<ReputationScore> {
        if !(1.0..=5.0).contains(&rating) {
            return Err(EngineError::validation("behavior rating must be between 1 and 5"));
        }
        let model = self.model;
        Ok(self
            .store
            .modify_reputation(user_id, Box::new(move |s| model.apply_behavior(s, rating)))
            .await?)
    }

    /// Record a peer review of `reviewee_id` and fold it into their behavior
    /// rating. Both users must have played in the match; one review per
    /// reviewer, reviewee and match.
    pub async fn submit_behavior_review(
        &self,
        reviewee_id: &str,
        reviewer_id: &str,
        match_id: Uuid,
        rating: f64,
        comment: Option<String>,
    ) -> EngineResult<ReputationScore> {
        if reviewee_id == reviewer_id {
            return Err(EngineError::validation("cannot review yourself"));
        }
        if !(1.0..=5.0).contains(&rating) {
            return Err(EngineError::validation("behavior rating must be between 1 and 5"));
        }

        let game = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::not_found("match", match_id))?;
        for user_id in [reviewer_id, reviewee_id] {
            if !game.is_participant(user_id) {
                return Err(EngineError::NotParticipant {
                    user_id: user_id.to_string(),
                    match_id,
                });
            }
        }

        let review = BehaviorReview {
            id: Uuid::new_v4(),
            match_id,
            reviewer_id: reviewer_id.to_string(),
            reviewee_id: reviewee_id.to_string(),
            rating,
            comment,
            created_at: Utc::now(),
        };
        self.store.insert_behavior_review(&review).await?;

        self.update_behavior_rating(reviewee_id, rating).await
    }

    /// Composite post-match update. Punctuality only applies to matches that
    /// were played.
    pub async fn update_reputation(&self, user_id: &str, feedback: ReputationFeedback) -> EngineResult<ReputationScore> {
        if let Some(rating) = feedback.behavior_rating {
            if !(1.0..=5.0).contains(&rating) {
                return Err(EngineError::validation("behavior rating must be between 1 and 5"));
            }
        }

        let model = self.model;
        let score = self
            .store
            .modify_reputation(
                user_id,
                Box::new(move |s| {
                    let status = if feedback.match_completed {
                        AttendanceStatus::Completed
                    } else {
                        AttendanceStatus::Cancelled
                    };
                    model.apply_attendance(s, status);
                    if feedback.match_completed {
                        model.apply_punctuality(s, feedback.was_on_time);
                    }
                    if let Some(rating) = feedback.behavior_rating {
                        model.apply_behavior(s, rating);
                    }
                }),
            )
            .await?;

        tracing::info!("Updated reputation for {}: overall {:.1}", user_id, score.overall_score);
        Ok(score)
    }

    async fn profile_level(&self, user_id: &str) -> EngineResult<f64> {
        Ok(self.profiles.get_profile(user_id).await?.skill_level)
    }

    /// Nudge the user's level towards the mean observed level of their recent
    /// accuracy records. Only records newer than the last automatic change
    /// count, so repeated or concurrent runs cannot apply the same evidence
    /// twice. Returns the audit record when the level moved.
    pub async fn auto_adjust_skill_level(&self, user_id: &str) -> EngineResult<Option<SkillLevelRecord>> {
        self.adjust_from_evidence(user_id, None).await
    }

    /// Same evidence rule as `auto_adjust_skill_level`, run when a result for
    /// `match_id` is confirmed. A resulting change is audited as `match_result`.
    pub async fn adjust_after_result(&self, user_id: &str, match_id: Uuid) -> EngineResult<Option<SkillLevelRecord>> {
        self.adjust_from_evidence(user_id, Some(match_id)).await
    }

    async fn adjust_from_evidence(
        &self,
        user_id: &str,
        trigger: Option<Uuid>,
    ) -> EngineResult<Option<SkillLevelRecord>> {
        let policy = self.model.auto_adjust;
        let state = self.store.skill_level_state(user_id).await?;
        let since = state.and_then(|s| s.last_auto_adjusted_at);

        let records = self
            .store
            .recent_skill_accuracy_records(user_id, since, policy.window.max(policy.min_records))
            .await?;
        if records.len() < policy.min_records {
            tracing::debug!(
                "Skipping auto-adjust for {}: {} new accuracy records",
                user_id,
                records.len()
            );
            return Ok(None);
        }

        let fallback_level = match state {
            Some(state) => state.level,
            None => self.profile_level(user_id).await?,
        };

        let (reason, note) = match trigger {
            Some(match_id) => (
                SkillChangeReason::MatchResult,
                format!("confirmed result of match {} over {} accuracy records", match_id, records.len()),
            ),
            None => (
                SkillChangeReason::AutoAdjustment,
                format!("mean observed level over {} matches", records.len()),
            ),
        };

        let model = self.model;
        let record = self
            .store
            .adjust_skill_level(
                user_id,
                fallback_level,
                Box::new(move |state| {
                    // Another run adjusted since our snapshot; its evidence overlaps ours
                    if state.last_auto_adjusted_at != since {
                        return None;
                    }
                    model
                        .suggest_skill_adjustment(state.level, &records)
                        .map(|new_level| SkillLevelChange {
                            new_level,
                            reason,
                            note: Some(note),
                            match_id: trigger,
                        })
                }),
            )
            .await?;

        if let Some(record) = &record {
            tracing::info!(
                "Adjusted skill level for {} ({:?}): {:.2} -> {:.2}",
                user_id,
                record.reason,
                record.old_level,
                record.new_level
            );
        }
        Ok(record)
    }

    pub async fn manually_adjust_skill_level(
        &self,
        user_id: &str,
        level: f64,
        reason: Option<String>,
    ) -> EngineResult<SkillLevelRecord> {
        let policy = self.model.auto_adjust;
        if !(policy.min_level..=policy.max_level).contains(&level) {
            return Err(EngineError::validation(format!(
                "skill level must be between {} and {}",
                policy.min_level, policy.max_level
            )));
        }

        let fallback_level = match self.store.skill_level_state(user_id).await? {
            Some(state) => state.level,
            None => self.profile_level(user_id).await?,
        };

        let record = self
            .store
            .adjust_skill_level(
                user_id,
                fallback_level,
                Box::new(move |_| {
                    Some(SkillLevelChange {
                        new_level: level,
                        reason: SkillChangeReason::Manual,
                        note: reason,
                        match_id: None,
                    })
                }),
            )
            .await?
            .ok_or_else(|| EngineError::Conflict("skill level change was not applied".to_string()))?;

        tracing::info!(
            "Manually set skill level for {}: {:.2} -> {:.2}",
            user_id,
            record.old_level,
            record.new_level
        );
        Ok(record)
    }

    /// One pass of auto-adjustment over every user with accuracy records.
    /// Per-user failures are logged and skipped. Returns how many levels moved.
    pub async fn run_auto_adjust_batch(&self) -> EngineResult<usize> {
        let users = self.store.users_with_skill_accuracy_records().await?;
        let mut adjusted = 0;

        for user_id in &users {
            match self.auto_adjust_skill_level(user_id).await {
                Ok(Some(_)) => adjusted += 1,
                Ok(None) => {}
                Err(e) => tracing::warn!("Auto-adjust failed for {}: {}", user_id, e),
            }
        }

        tracing::info!("Auto-adjust batch: {} of {} users adjusted", adjusted, users.len());
        Ok(adjusted)
    }

    /// Run `run_auto_adjust_batch` every `period` until the handle is aborted
    pub fn spawn_auto_adjust_job(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_auto_adjust_batch().await {
                    tracing::error!("Auto-adjust batch failed: {}", e);
                }
            }
        })
    }
}
