use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::EngineError;
use crate::models::{MatchType, MatchingCriteria};

/// Request to find matches
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(range(min = 1.0, max = 7.0))]
    #[serde(rename = "minSkillLevel", default)]
    pub min_skill_level: Option<f64>,
    #[validate(range(min = 1.0, max = 7.0))]
    #[serde(rename = "maxSkillLevel", default)]
    pub max_skill_level: Option<f64>,
    #[validate(range(min = 0.1, max = 1000.0))]
    #[serde(rename = "maxDistanceKm", default)]
    pub max_distance_km: Option<f64>,
    #[serde(rename = "requireLocation", default)]
    pub require_location: bool,
    #[serde(default)]
    pub frequency: Option<String>,
    #[validate(range(min = 10, max = 120))]
    #[serde(rename = "minAge", default)]
    pub min_age: Option<u32>,
    #[validate(range(min = 10, max = 120))]
    #[serde(rename = "maxAge", default)]
    pub max_age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(rename = "minReputation", default)]
    pub min_reputation: Option<f64>,
    #[serde(rename = "playTypes", default)]
    pub play_types: Vec<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(rename = "excludeUserIds", default)]
    pub exclude_user_ids: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u16,
    #[serde(rename = "includeBreakdown", default)]
    pub include_breakdown: bool,
}

fn default_limit() -> u16 {
    20
}

impl FindMatchesRequest {
    /// Cross-field checks the derive can't express, then build criteria
    pub fn to_criteria(&self) -> Result<MatchingCriteria, EngineError> {
        if let (Some(min), Some(max)) = (self.min_skill_level, self.max_skill_level) {
            if min > max {
                return Err(EngineError::validation("minSkillLevel must not exceed maxSkillLevel"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(EngineError::validation("minAge must not exceed maxAge"));
            }
        }

        Ok(MatchingCriteria {
            requester_id: self.user_id.clone(),
            min_skill_level: self.min_skill_level,
            max_skill_level: self.max_skill_level,
            max_distance_km: self.max_distance_km,
            require_location: self.require_location,
            frequency: self.frequency.clone(),
            min_age: self.min_age,
            max_age: self.max_age,
            gender: self.gender.clone(),
            min_reputation: self.min_reputation,
            play_types: self.play_types.clone(),
            availability: self.availability.clone(),
            exclude_user_ids: self.exclude_user_ids.clone(),
            limit: self.limit as usize,
        })
    }
}

/// Request for randomized card discovery
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RandomMatchesRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub criteria: FindMatchesRequest,
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_count")]
    pub count: u16,
    /// Fixed seed for reproducible draws
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_count() -> u16 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CardActionRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "actorId")]
    pub actor_id: String,
    #[validate(length(min = 1))]
    #[serde(rename = "targetId")]
    pub target_id: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMatchRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "organizerId")]
    pub organizer_id: String,
    #[serde(rename = "matchType")]
    pub match_type: MatchType,
    #[validate(length(min = 1, max = 3))]
    #[serde(rename = "inviteeIds")]
    pub invitee_ids: Vec<String>,
    #[serde(rename = "courtId", default)]
    pub court_id: Option<String>,
    #[serde(rename = "scheduledAt", default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordResultRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "winnerId")]
    pub winner_id: String,
    #[validate(length(min = 1))]
    #[serde(rename = "loserId")]
    pub loser_id: String,
    #[validate(length(min = 1, max = 64))]
    pub score: String,
    #[validate(length(min = 1))]
    #[serde(rename = "recordedBy")]
    pub recorded_by: String,
}

/// Body naming the acting user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActingUserRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Invitee's answer to a match invite
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InviteResponseRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "userId")]
    pub user_id: String,
    pub accept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateReputationRequest {
    #[serde(rename = "matchCompleted")]
    pub match_completed: bool,
    #[serde(rename = "wasOnTime")]
    pub was_on_time: bool,
    #[validate(range(max = 600))]
    #[serde(rename = "delayMinutes", default)]
    pub delay_minutes: Option<u32>,
    #[validate(range(min = 1.0, max = 5.0))]
    #[serde(rename = "behaviorRating", default)]
    pub behavior_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BehaviorReviewRequest {
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    #[validate(length(min = 1))]
    #[serde(rename = "reviewerId")]
    pub reviewer_id: String,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: f64,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SkillLevelRequest {
    #[validate(range(min = 1.0, max = 7.0))]
    pub level: f64,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SkillAccuracyRequest {
    #[validate(range(min = 1.0, max = 7.0))]
    #[serde(rename = "reportedLevel")]
    pub reported_level: f64,
    #[validate(range(min = 1.0, max = 7.0))]
    #[serde(rename = "observedLevel")]
    pub observed_level: f64,
    #[serde(rename = "matchId", default)]
    pub match_id: Option<Uuid>,
}

/// Partial privacy update; omitted flags keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePrivacyRequest {
    #[serde(rename = "showReputationScore", default)]
    pub show_reputation_score: Option<bool>,
    #[serde(rename = "showMatchHistory", default)]
    pub show_match_history: Option<bool>,
    #[serde(rename = "showWinLossRecord", default)]
    pub show_win_loss_record: Option<bool>,
    #[serde(rename = "showSkillProgression", default)]
    pub show_skill_progression: Option<bool>,
    #[serde(rename = "showBehaviorReviews", default)]
    pub show_behavior_reviews: Option<bool>,
    #[serde(rename = "showDetailedStats", default)]
    pub show_detailed_stats: Option<bool>,
    #[serde(rename = "allowStatsSharing", default)]
    pub allow_stats_sharing: Option<bool>,
}

/// `?requestingUserId=` on privacy-projected reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterQuery {
    #[serde(rename = "requestingUserId")]
    pub requesting_user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "unreadOnly", default)]
    pub unread_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FindMatchesRequest {
        serde_json::from_value(serde_json::json!({ "userId": "u1" })).unwrap()
    }

    #[test]
    fn test_defaults() {
        let req = request();
        assert_eq!(req.limit, 20);
        assert!(!req.include_breakdown);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_inverted_skill_range_rejected() {
        let mut req = request();
        req.min_skill_level = Some(5.0);
        req.max_skill_level = Some(4.0);
        assert!(matches!(req.to_criteria(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_out_of_scale_skill_rejected() {
        let mut req = request();
        req.max_skill_level = Some(8.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_random_request_flattens_criteria() {
        let req: RandomMatchesRequest = serde_json::from_value(serde_json::json!({
            "userId": "u1",
            "maxDistanceKm": 15.0,
            "count": 5,
            "seed": 9
        }))
        .unwrap();
        assert_eq!(req.criteria.max_distance_km, Some(15.0));
        assert_eq!(req.count, 5);
        assert_eq!(req.seed, Some(9));
    }
}
