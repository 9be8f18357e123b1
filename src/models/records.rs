use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Swipe action on a discovery card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "card_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CardAction {
    Like,
    Dislike,
    Skip,
}

impl CardAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardAction::Like => "like",
            CardAction::Dislike => "dislike",
            CardAction::Skip => "skip",
        }
    }
}

impl FromStr for CardAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(CardAction::Like),
            "dislike" => Ok(CardAction::Dislike),
            "skip" => Ok(CardAction::Skip),
            other => Err(format!("unknown card action '{}'", other)),
        }
    }
}

/// One actor -> target swipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CardInteraction {
    pub id: Uuid,
    #[serde(rename = "actorId")]
    pub actor_id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    pub action: CardAction,
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "matchId")]
    pub match_id: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl CardInteraction {
    pub fn new(actor_id: &str, target_id: &str, action: CardAction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            action,
            is_match: false,
            match_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of a card action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMatchResult {
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "matchId")]
    pub match_id: Option<Uuid>,
    #[serde(rename = "chatRoomId")]
    pub chat_room_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Casual,
    Practice,
    Tournament,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "participant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Invited,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParticipant {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub status: ParticipantStatus,
}

/// A scheduled or implicit game between players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    #[serde(rename = "matchType")]
    pub match_type: MatchType,
    pub status: MatchStatus,
    #[serde(rename = "organizerId")]
    pub organizer_id: Option<String>,
    #[serde(rename = "courtId")]
    pub court_id: Option<String>,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub participants: Vec<MatchParticipant>,
    #[serde(rename = "chatRoomId")]
    pub chat_room_id: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// Casual match born from a mutual like; both players already accepted
    pub fn mutual(first: &str, second: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            match_type: MatchType::Casual,
            status: MatchStatus::Pending,
            organizer_id: None,
            court_id: None,
            scheduled_at: None,
            participants: vec![
                MatchParticipant {
                    user_id: first.to_string(),
                    status: ParticipantStatus::Accepted,
                },
                MatchParticipant {
                    user_id: second.to_string(),
                    status: ParticipantStatus::Accepted,
                },
            ],
            chat_room_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&MatchParticipant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Accepted players only; pending and declined invitees do not count
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participant(user_id)
            .is_some_and(|p| p.status == ParticipantStatus::Accepted)
    }

    /// Invited or accepted
    pub fn involves(&self, user_id: &str) -> bool {
        self.participant(user_id)
            .is_some_and(|p| p.status != ParticipantStatus::Declined)
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Accepted)
            .map(|p| p.user_id.as_str())
    }
}

/// Chat channel linked one-to-one with a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatRoom {
    pub id: Uuid,
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn for_match(match_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            match_id,
            created_at: Utc::now(),
        }
    }
}

/// Match created from a mutual like, plus whether this call created it
#[derive(Debug, Clone)]
pub struct MutualMatch {
    pub game: Match,
    pub chat_room: ChatRoom,
    pub notifications: Vec<MatchNotification>,
    pub created: bool,
}

/// Canonical key for an unordered pair of users.
///
/// The lower id is length-prefixed so ids containing the separator cannot
/// collide: ("a:b", "c") and ("a", "b:c") give "3:a:b:c" and "1:a:b:c".
pub fn pair_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}:{}", low.len(), low, high)
}

/// Reported outcome of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchResult {
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    #[serde(rename = "winnerId")]
    pub winner_id: String,
    #[serde(rename = "loserId")]
    pub loser_id: String,
    pub score: String,
    #[serde(rename = "recordedBy")]
    pub recorded_by: String,
    #[serde(rename = "isConfirmed")]
    pub is_confirmed: bool,
    #[serde(rename = "confirmedBy")]
    pub confirmed_by: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "confirmedAt")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Attendance outcome for a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Completed,
    Cancelled,
    NoShow,
}

/// Rolling reputation for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReputationScore {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "attendanceRate")]
    pub attendance_rate: f64,
    #[serde(rename = "punctualityScore")]
    pub punctuality_score: f64,
    #[serde(rename = "skillAccuracy")]
    pub skill_accuracy: f64,
    /// Stored on the 1-5 review scale
    #[serde(rename = "behaviorRating")]
    pub behavior_rating: f64,
    #[serde(rename = "totalMatches")]
    pub total_matches: i32,
    #[serde(rename = "completedMatches")]
    pub completed_matches: i32,
    #[serde(rename = "cancelledMatches")]
    pub cancelled_matches: i32,
    #[serde(rename = "overallScore")]
    pub overall_score: f64,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ReputationScore {
    /// Row handed out on first access
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            attendance_rate: 100.0,
            punctuality_score: 100.0,
            skill_accuracy: 100.0,
            behavior_rating: 5.0,
            total_matches: 0,
            completed_matches: 0,
            cancelled_matches: 0,
            overall_score: 100.0,
            updated_at: Utc::now(),
        }
    }

    /// Behavior rating on the 0-100 scale used for blending
    pub fn behavior_score(&self) -> f64 {
        self.behavior_rating * 20.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "skill_change_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkillChangeReason {
    Manual,
    AutoAdjustment,
    /// Auto-adjustment triggered by a confirmed match result
    MatchResult,
}

impl SkillChangeReason {
    /// Evidence-driven changes; these advance the auto-adjust watermark
    pub fn is_automatic(&self) -> bool {
        matches!(self, SkillChangeReason::AutoAdjustment | SkillChangeReason::MatchResult)
    }
}

/// Append-only audit entry for a skill level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SkillLevelRecord {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "oldLevel")]
    pub old_level: f64,
    #[serde(rename = "newLevel")]
    pub new_level: f64,
    pub reason: SkillChangeReason,
    pub note: Option<String>,
    #[serde(rename = "matchId")]
    pub match_id: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Current level plus what the adjustment closure needs to stay idempotent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillLevelState {
    pub level: f64,
    pub last_auto_adjusted_at: Option<DateTime<Utc>>,
}

/// Requested level change, produced under the store's per-user lock
#[derive(Debug, Clone, PartialEq)]
pub struct SkillLevelChange {
    pub new_level: f64,
    pub reason: SkillChangeReason,
    pub note: Option<String>,
    pub match_id: Option<Uuid>,
}

/// Self-reported vs observed level for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SkillAccuracyRecord {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "reportedLevel")]
    pub reported_level: f64,
    #[serde(rename = "observedLevel")]
    pub observed_level: f64,
    #[serde(rename = "matchId")]
    pub match_id: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Peer review left after a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BehaviorReview {
    pub id: Uuid,
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    #[serde(rename = "reviewerId")]
    pub reviewer_id: String,
    #[serde(rename = "revieweeId")]
    pub reviewee_id: String,
    pub rating: f64,
    pub comment: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Per-user visibility switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPrivacySettings {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "showReputationScore")]
    pub show_reputation_score: bool,
    #[serde(rename = "showMatchHistory")]
    pub show_match_history: bool,
    #[serde(rename = "showWinLossRecord")]
    pub show_win_loss_record: bool,
    #[serde(rename = "showSkillProgression")]
    pub show_skill_progression: bool,
    #[serde(rename = "showBehaviorReviews")]
    pub show_behavior_reviews: bool,
    #[serde(rename = "showDetailedStats")]
    pub show_detailed_stats: bool,
    #[serde(rename = "allowStatsSharing")]
    pub allow_stats_sharing: bool,
}

impl UserPrivacySettings {
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            show_reputation_score: true,
            show_match_history: true,
            show_win_loss_record: true,
            show_skill_progression: true,
            show_behavior_reviews: false,
            show_detailed_stats: true,
            allow_stats_sharing: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    MutualMatch,
    MatchInvite,
    ResultRecorded,
    ResultConfirmed,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationType::MutualMatch => "mutual_match",
            NotificationType::MatchInvite => "match_invite",
            NotificationType::ResultRecorded => "result_recorded",
            NotificationType::ResultConfirmed => "result_confirmed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchNotification {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    #[serde(rename = "isRead")]
    pub is_read: bool,
    #[serde(rename = "readAt")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl MatchNotification {
    pub fn new(
        user_id: &str,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            notification_type,
            title: title.into(),
            message: message.into(),
            payload,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    /// Notification sent to `user_id` when a mutual like produced `game`
    pub fn mutual_match(user_id: &str, partner_id: &str, game: &Match, chat_room: &ChatRoom) -> Self {
        Self::new(
            user_id,
            NotificationType::MutualMatch,
            "It's a match!",
            format!("You and {} liked each other", partner_id),
            serde_json::json!({
                "matchId": game.id,
                "chatRoomId": chat_room.id,
                "partnerId": partner_id,
            }),
        )
    }
}

/// One row of a user's match history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryEntry {
    #[serde(rename = "matchId")]
    pub match_id: Uuid,
    #[serde(rename = "matchType")]
    pub match_type: MatchType,
    pub status: MatchStatus,
    #[serde(rename = "opponentIds")]
    pub opponent_ids: Vec<String>,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// `Some(true)` won, `Some(false)` lost, `None` no confirmed result
    pub won: Option<bool>,
    pub score: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinLossRecord {
    pub wins: u32,
    pub losses: u32,
    #[serde(rename = "winRate")]
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedStats {
    #[serde(rename = "casualMatches")]
    pub casual_matches: u32,
    #[serde(rename = "practiceMatches")]
    pub practice_matches: u32,
    #[serde(rename = "tournamentMatches")]
    pub tournament_matches: u32,
    #[serde(rename = "confirmedResults")]
    pub confirmed_results: u32,
    #[serde(rename = "currentSkillLevel")]
    pub current_skill_level: Option<f64>,
}

/// Privacy-projected aggregate for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "totalMatches")]
    pub total_matches: u32,
    #[serde(rename = "completedMatches")]
    pub completed_matches: u32,
    #[serde(rename = "cancelledMatches")]
    pub cancelled_matches: u32,
    #[serde(rename = "winLoss")]
    pub win_loss: Option<WinLossRecord>,
    pub reputation: Option<ReputationScore>,
    #[serde(rename = "recentMatches")]
    pub recent_matches: Option<Vec<MatchHistoryEntry>>,
    pub detailed: Option<DetailedStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("bob", "alice"), pair_key("alice", "bob"));
        assert_eq!(pair_key("alice", "bob"), "5:alice:bob");
    }

    #[test]
    fn test_pair_key_ids_with_separator_do_not_collide() {
        assert_ne!(pair_key("a:b", "c"), pair_key("a", "b:c"));
        assert_ne!(pair_key("x", "y:z"), pair_key("x:y", "z"));
        assert_eq!(pair_key("c", "a:b"), pair_key("a:b", "c"));
    }

    #[test]
    fn test_invitee_is_not_a_participant_until_accepting() {
        let mut game = Match::mutual("org", "guest");
        game.participants[1].status = ParticipantStatus::Invited;

        assert!(game.is_participant("org"));
        assert!(!game.is_participant("guest"));
        assert!(game.involves("guest"));
        assert_eq!(game.participant_ids().collect::<Vec<_>>(), vec!["org"]);

        game.participants[1].status = ParticipantStatus::Declined;
        assert!(!game.involves("guest"));
    }

    #[test]
    fn test_card_action_parse() {
        assert_eq!("LIKE".parse::<CardAction>(), Ok(CardAction::Like));
        assert!("superlike".parse::<CardAction>().is_err());
    }

    #[test]
    fn test_fresh_reputation_defaults() {
        let score = ReputationScore::new("u1");
        assert_eq!(score.attendance_rate, 100.0);
        assert_eq!(score.punctuality_score, 100.0);
        assert_eq!(score.skill_accuracy, 100.0);
        assert_eq!(score.behavior_score(), 100.0);
        assert_eq!(score.overall_score, 100.0);
    }

    #[test]
    fn test_behavior_reviews_hidden_by_default() {
        let settings = UserPrivacySettings::defaults_for("u1");
        assert!(!settings.show_behavior_reviews);
        assert!(settings.show_match_history);
        assert!(settings.allow_stats_sharing);
    }
}
