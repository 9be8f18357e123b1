// Model exports
pub mod domain;
pub mod records;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, Candidate, MatchingCriteria, MatchingResult, PlayerProfile, ScoreBreakdown, ScoringParams,
    ScoringWeights,
};
pub use records::{
    pair_key, AttendanceStatus, BehaviorReview, CardAction, CardInteraction, CardMatchResult, ChatRoom,
    DetailedStats, Match, MatchHistoryEntry, MatchNotification, MatchParticipant, MatchResult, MatchStatistics,
    MatchStatus, MatchType, MutualMatch, NotificationType, ParticipantStatus, ReputationScore, SkillAccuracyRecord,
    SkillChangeReason, SkillLevelChange, SkillLevelRecord, SkillLevelState, UserPrivacySettings, WinLossRecord,
};
pub use requests::{
    ActingUserRequest, BehaviorReviewRequest, CardActionRequest, CreateMatchRequest, FindMatchesRequest,
    InviteResponseRequest, NotificationQuery, RandomMatchesRequest, RecordResultRequest, RequesterQuery,
    SkillAccuracyRequest, SkillLevelRequest, UpdatePrivacyRequest, UpdateReputationRequest,
};
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse};
