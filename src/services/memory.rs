use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::models::{
    pair_key, BehaviorReview, CardAction, CardInteraction, ChatRoom, Match, MatchNotification, MatchResult,
    MatchStatus, MatchingCriteria, MutualMatch, ParticipantStatus, PlayerProfile, ReputationScore,
    SkillAccuracyRecord, SkillLevelRecord, SkillLevelState, UserPrivacySettings,
};
use crate::services::profiles::{ProfileError, ProfileSource};
use crate::services::store::{
    ReputationMutation, SkillLevelAdjustment, Store, StoreError, StoreResult,
};

#[derive(Default)]
struct Tables {
    interactions: HashMap<(String, String), CardInteraction>,
    matches: HashMap<Uuid, Match>,
    mutual_pairs: HashMap<String, Uuid>,
    chat_rooms: HashMap<Uuid, ChatRoom>,
    results: HashMap<Uuid, MatchResult>,
    reputations: HashMap<String, ReputationScore>,
    reviews: Vec<BehaviorReview>,
    accuracy: Vec<SkillAccuracyRecord>,
    skill_levels: HashMap<String, f64>,
    skill_history: Vec<SkillLevelRecord>,
    privacy: HashMap<String, UserPrivacySettings>,
    notifications: Vec<MatchNotification>,
}

impl Tables {
    fn last_auto_adjusted_at(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.skill_history
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.reason.is_automatic())
            .map(|r| r.created_at)
    }

    fn existing_mutual(&self, key: &str) -> Option<MutualMatch> {
        let match_id = self.mutual_pairs.get(key)?;
        let game = self.matches.get(match_id)?.clone();
        let chat_room = self.chat_rooms.get(match_id)?.clone();
        Some(MutualMatch {
            game,
            chat_room,
            notifications: Vec::new(),
            created: false,
        })
    }
}

/// In-process `Store` backed by a single mutex over all tables.
///
/// Every trait call takes the lock once, so multi-row operations are atomic
/// the same way a single database transaction would be.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_card_interaction(&self, interaction: CardInteraction) -> StoreResult<CardInteraction> {
        let mut tables = self.lock();
        let key = (interaction.actor_id.clone(), interaction.target_id.clone());

        if let Some(existing) = tables.interactions.get_mut(&key) {
            if !existing.is_match {
                existing.action = interaction.action;
                existing.updated_at = interaction.updated_at;
            }
            return Ok(existing.clone());
        }

        tables.interactions.insert(key, interaction.clone());
        Ok(interaction)
    }

    async fn find_card_interaction(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<CardInteraction>> {
        let tables = self.lock();
        Ok(tables
            .interactions
            .get(&(actor_id.to_string(), target_id.to_string()))
            .cloned())
    }

    async fn create_mutual_match(&self, actor_id: &str, target_id: &str) -> StoreResult<Option<MutualMatch>> {
        let mut tables = self.lock();
        let key = pair_key(actor_id, target_id);

        if let Some(existing) = tables.existing_mutual(&key) {
            return Ok(Some(existing));
        }

        let forward = (actor_id.to_string(), target_id.to_string());
        let reverse = (target_id.to_string(), actor_id.to_string());
        let both_like = [&forward, &reverse].iter().all(|k| {
            tables
                .interactions
                .get(*k)
                .map(|i| i.action == CardAction::Like)
                .unwrap_or(false)
        });
        if !both_like {
            return Ok(None);
        }

        let mut game = Match::mutual(actor_id, target_id);
        let chat_room = ChatRoom::for_match(game.id);
        game.chat_room_id = Some(chat_room.id);

        let now = Utc::now();
        for k in [&forward, &reverse] {
            if let Some(interaction) = tables.interactions.get_mut(k) {
                interaction.is_match = true;
                interaction.match_id = Some(game.id);
                interaction.updated_at = now;
            }
        }

        let notifications = vec![
            MatchNotification::mutual_match(actor_id, target_id, &game, &chat_room),
            MatchNotification::mutual_match(target_id, actor_id, &game, &chat_room),
        ];

        tables.mutual_pairs.insert(key, game.id);
        tables.chat_rooms.insert(game.id, chat_room.clone());
        tables.matches.insert(game.id, game.clone());
        tables.notifications.extend(notifications.iter().cloned());

        Ok(Some(MutualMatch {
            game,
            chat_room,
            notifications,
            created: true,
        }))
    }

    async fn insert_match(&self, game: &Match) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.matches.contains_key(&game.id) {
            return Err(StoreError::Conflict(format!("match {} already exists", game.id)));
        }
        if let Some(room_id) = game.chat_room_id {
            tables.chat_rooms.insert(
                game.id,
                ChatRoom {
                    id: room_id,
                    match_id: game.id,
                    created_at: game.created_at,
                },
            );
        }
        tables.matches.insert(game.id, game.clone());
        Ok(())
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        Ok(self.lock().matches.get(&match_id).cloned())
    }

    async fn update_match_status(&self, match_id: Uuid, status: MatchStatus) -> StoreResult<Match> {
        let mut tables = self.lock();
        let game = tables
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;
        game.status = status;
        game.updated_at = Utc::now();
        Ok(game.clone())
    }

    async fn set_participant_status(
        &self,
        match_id: Uuid,
        user_id: &str,
        status: ParticipantStatus,
    ) -> StoreResult<Match> {
        let mut tables = self.lock();
        let game = tables
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))?;
        let participant = game
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("{} on match {}", user_id, match_id)))?;

        if participant.status == status {
            return Ok(game.clone());
        }
        if participant.status != ParticipantStatus::Invited {
            return Err(StoreError::Conflict(format!(
                "{} already answered the invite to match {}",
                user_id, match_id
            )));
        }

        participant.status = status;
        game.updated_at = Utc::now();
        Ok(game.clone())
    }

    async fn matches_for_user(&self, user_id: &str) -> StoreResult<Vec<Match>> {
        let tables = self.lock();
        let mut games: Vec<Match> = tables
            .matches
            .values()
            .filter(|m| m.involves(user_id))
            .cloned()
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    async fn insert_match_result(&self, result: &MatchResult) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.results.contains_key(&result.match_id) {
            return Err(StoreError::Conflict(format!(
                "match {} already has a result",
                result.match_id
            )));
        }
        tables.results.insert(result.match_id, result.clone());
        Ok(())
    }

    async fn get_match_result(&self, match_id: Uuid) -> StoreResult<Option<MatchResult>> {
        Ok(self.lock().results.get(&match_id).cloned())
    }

    async fn confirm_match_result(
        &self,
        match_id: Uuid,
        user_id: &str,
        required: usize,
    ) -> StoreResult<(MatchResult, bool)> {
        let mut tables = self.lock();
        let result = tables
            .results
            .get_mut(&match_id)
            .ok_or_else(|| StoreError::NotFound(format!("result for match {}", match_id)))?;

        if !result.confirmed_by.iter().any(|u| u == user_id) {
            result.confirmed_by.push(user_id.to_string());
        }

        let mut newly_confirmed = false;
        if !result.is_confirmed && result.confirmed_by.len() >= required {
            result.is_confirmed = true;
            result.confirmed_at = Some(Utc::now());
            newly_confirmed = true;
        }

        Ok((result.clone(), newly_confirmed))
    }

    async fn results_for_user(&self, user_id: &str) -> StoreResult<Vec<MatchResult>> {
        let tables = self.lock();
        Ok(tables
            .results
            .values()
            .filter(|r| r.winner_id == user_id || r.loser_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_or_create_reputation(&self, user_id: &str) -> StoreResult<ReputationScore> {
        let mut tables = self.lock();
        Ok(tables
            .reputations
            .entry(user_id.to_string())
            .or_insert_with(|| ReputationScore::new(user_id))
            .clone())
    }

    async fn reputation_scores(&self, user_ids: &[String]) -> StoreResult<HashMap<String, ReputationScore>> {
        let tables = self.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.reputations.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }

    async fn modify_reputation(&self, user_id: &str, mutation: ReputationMutation) -> StoreResult<ReputationScore> {
        let mut tables = self.lock();
        let score = tables
            .reputations
            .entry(user_id.to_string())
            .or_insert_with(|| ReputationScore::new(user_id));
        mutation(score);
        score.updated_at = Utc::now();
        Ok(score.clone())
    }

    async fn insert_behavior_review(&self, review: &BehaviorReview) -> StoreResult<()> {
        let mut tables = self.lock();
        let duplicate = tables.reviews.iter().any(|r| {
            r.match_id == review.match_id && r.reviewer_id == review.reviewer_id && r.reviewee_id == review.reviewee_id
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} already reviewed {} for match {}",
                review.reviewer_id, review.reviewee_id, review.match_id
            )));
        }
        tables.reviews.push(review.clone());
        Ok(())
    }

    async fn behavior_reviews_for(&self, reviewee_id: &str) -> StoreResult<Vec<BehaviorReview>> {
        let tables = self.lock();
        Ok(tables
            .reviews
            .iter()
            .rev()
            .filter(|r| r.reviewee_id == reviewee_id)
            .cloned()
            .collect())
    }

    async fn insert_skill_accuracy_record(&self, record: &SkillAccuracyRecord) -> StoreResult<()> {
        self.lock().accuracy.push(record.clone());
        Ok(())
    }

    async fn recent_skill_accuracy_records(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<SkillAccuracyRecord>> {
        let tables = self.lock();
        Ok(tables
            .accuracy
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .filter(|r| since.map_or(true, |s| r.created_at > s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn users_with_skill_accuracy_records(&self) -> StoreResult<Vec<String>> {
        let tables = self.lock();
        let users: BTreeSet<&String> = tables.accuracy.iter().map(|r| &r.user_id).collect();
        Ok(users.into_iter().cloned().collect())
    }

    async fn skill_levels(&self, user_ids: &[String]) -> StoreResult<HashMap<String, f64>> {
        let tables = self.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.skill_levels.get(id).map(|level| (id.clone(), *level)))
            .collect())
    }

    async fn skill_level_state(&self, user_id: &str) -> StoreResult<Option<SkillLevelState>> {
        let tables = self.lock();
        Ok(tables.skill_levels.get(user_id).map(|level| SkillLevelState {
            level: *level,
            last_auto_adjusted_at: tables.last_auto_adjusted_at(user_id),
        }))
    }

    async fn adjust_skill_level(
        &self,
        user_id: &str,
        fallback_level: f64,
        adjust: SkillLevelAdjustment,
    ) -> StoreResult<Option<SkillLevelRecord>> {
        let mut tables = self.lock();
        let state = SkillLevelState {
            level: tables.skill_levels.get(user_id).copied().unwrap_or(fallback_level),
            last_auto_adjusted_at: tables.last_auto_adjusted_at(user_id),
        };

        let Some(change) = adjust(state) else {
            return Ok(None);
        };

        let record = SkillLevelRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            old_level: state.level,
            new_level: change.new_level,
            reason: change.reason,
            note: change.note,
            match_id: change.match_id,
            created_at: Utc::now(),
        };
        tables.skill_levels.insert(user_id.to_string(), change.new_level);
        tables.skill_history.push(record.clone());
        Ok(Some(record))
    }

    async fn skill_level_history(&self, user_id: &str) -> StoreResult<Vec<SkillLevelRecord>> {
        let tables = self.lock();
        Ok(tables
            .skill_history
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_privacy_settings(&self, user_id: &str) -> StoreResult<UserPrivacySettings> {
        let tables = self.lock();
        Ok(tables
            .privacy
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPrivacySettings::defaults_for(user_id)))
    }

    async fn save_privacy_settings(&self, settings: &UserPrivacySettings) -> StoreResult<UserPrivacySettings> {
        let mut tables = self.lock();
        tables.privacy.insert(settings.user_id.clone(), settings.clone());
        Ok(settings.clone())
    }

    async fn insert_notifications(&self, notifications: &[MatchNotification]) -> StoreResult<()> {
        self.lock().notifications.extend(notifications.iter().cloned());
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str, unread_only: bool) -> StoreResult<Vec<MatchNotification>> {
        let tables = self.lock();
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: Uuid, user_id: &str) -> StoreResult<MatchNotification> {
        let mut tables = self.lock();
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", notification_id)))?;
        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
        }
        Ok(notification.clone())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Fixed profile set, for tests and local runs without the profile service
#[derive(Default)]
pub struct StaticProfiles {
    profiles: RwLock<HashMap<String, PlayerProfile>>,
}

impl StaticProfiles {
    pub fn new(profiles: impl IntoIterator<Item = PlayerProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.user_id.clone(), p)).collect()),
        }
    }

    pub fn insert(&self, profile: PlayerProfile) {
        let mut profiles = self.profiles.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        profiles.insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn get_profile(&self, user_id: &str) -> Result<PlayerProfile, ProfileError> {
        let profiles = self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(user_id.to_string()))
    }

    async fn query_candidates(
        &self,
        requester: &PlayerProfile,
        _criteria: &MatchingCriteria,
        limit: usize,
    ) -> Result<Vec<PlayerProfile>, ProfileError> {
        let profiles = self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut pool: Vec<PlayerProfile> = profiles
            .values()
            .filter(|p| p.user_id != requester.user_id)
            .cloned()
            .collect();
        pool.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        pool.truncate(limit);
        Ok(pool)
    }
}
