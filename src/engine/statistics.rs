use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::privacy::{check_access, project};
use crate::error::{EngineResult, PrivateResource};
use crate::models::{
    BehaviorReview, DetailedStats, Match, MatchHistoryEntry, MatchResult, MatchStatistics, MatchStatus, MatchType,
    ReputationScore, SkillLevelRecord, UpdatePrivacyRequest, UserPrivacySettings, WinLossRecord,
};
use crate::services::Store;

/// Read paths over a user's history, each passed through the privacy gate
pub struct StatisticsService {
    store: Arc<dyn Store>,
    recent_matches_limit: usize,
}

impl StatisticsService {
    pub fn new(store: Arc<dyn Store>, recent_matches_limit: usize) -> Self {
        Self {
            store,
            recent_matches_limit,
        }
    }

    pub async fn get_privacy_settings(&self, user_id: &str) -> EngineResult<UserPrivacySettings> {
        Ok(self.store.get_privacy_settings(user_id).await?)
    }

    /// Apply the flags present in `update`; absent flags keep their value
    pub async fn update_privacy_settings(
        &self,
        user_id: &str,
        update: &UpdatePrivacyRequest,
    ) -> EngineResult<UserPrivacySettings> {
        let mut settings = self.store.get_privacy_settings(user_id).await?;

        let flags = [
            (&mut settings.show_reputation_score, update.show_reputation_score),
            (&mut settings.show_match_history, update.show_match_history),
            (&mut settings.show_win_loss_record, update.show_win_loss_record),
            (&mut settings.show_skill_progression, update.show_skill_progression),
            (&mut settings.show_behavior_reviews, update.show_behavior_reviews),
            (&mut settings.show_detailed_stats, update.show_detailed_stats),
            (&mut settings.allow_stats_sharing, update.allow_stats_sharing),
        ];
        for (flag, value) in flags {
            if let Some(value) = value {
                *flag = value;
            }
        }

        let saved = self.store.save_privacy_settings(&settings).await?;
        tracing::info!("Updated privacy settings for {}", user_id);
        Ok(saved)
    }

    async fn gate(&self, user_id: &str, resource: PrivateResource, requesting_user_id: &str) -> EngineResult<UserPrivacySettings> {
        let settings = self.store.get_privacy_settings(user_id).await?;
        check_access(&settings, resource, requesting_user_id)?;
        Ok(settings)
    }

    pub async fn get_reputation_score(&self, user_id: &str, requesting_user_id: &str) -> EngineResult<ReputationScore> {
        self.gate(user_id, PrivateResource::ReputationScore, requesting_user_id).await?;
        Ok(self.store.get_or_create_reputation(user_id).await?)
    }

    pub async fn get_match_history(&self, user_id: &str, requesting_user_id: &str) -> EngineResult<Vec<MatchHistoryEntry>> {
        self.gate(user_id, PrivateResource::MatchHistory, requesting_user_id).await?;
        self.history(user_id).await
    }

    pub async fn get_skill_progression(
        &self,
        user_id: &str,
        requesting_user_id: &str,
    ) -> EngineResult<Vec<SkillLevelRecord>> {
        self.gate(user_id, PrivateResource::SkillProgression, requesting_user_id).await?;
        Ok(self.store.skill_level_history(user_id).await?)
    }

    pub async fn get_behavior_reviews(&self, user_id: &str, requesting_user_id: &str) -> EngineResult<Vec<BehaviorReview>> {
        self.gate(user_id, PrivateResource::BehaviorReviews, requesting_user_id).await?;
        Ok(self.store.behavior_reviews_for(user_id).await?)
    }

    /// Aggregate view. Non-owners need stats sharing enabled; each section is
    /// then dropped if its own flag is off.
    pub async fn get_user_match_statistics(
        &self,
        user_id: &str,
        requesting_user_id: &str,
    ) -> EngineResult<MatchStatistics> {
        let settings = self.gate(user_id, PrivateResource::Statistics, requesting_user_id).await?;

        let games = self.store.matches_for_user(user_id).await?;
        let results = self.results_by_match(user_id).await?;

        let completed_matches = count_status(&games, MatchStatus::Completed);
        let cancelled_matches = count_status(&games, MatchStatus::Cancelled);

        let win_loss = win_loss(user_id, results.values());

        let reputation = if check_access(&settings, PrivateResource::ReputationScore, requesting_user_id).is_ok() {
            Some(self.store.get_or_create_reputation(user_id).await?)
        } else {
            None
        };

        let recent: Vec<MatchHistoryEntry> = games
            .iter()
            .take(self.recent_matches_limit)
            .map(|game| history_entry(user_id, game, results.get(&game.id)))
            .collect();

        let detailed = if check_access(&settings, PrivateResource::DetailedStats, requesting_user_id).is_ok() {
            let current_skill_level = self.store.skill_level_state(user_id).await?.map(|s| s.level);
            Some(DetailedStats {
                casual_matches: count_type(&games, MatchType::Casual),
                practice_matches: count_type(&games, MatchType::Practice),
                tournament_matches: count_type(&games, MatchType::Tournament),
                confirmed_results: results.values().filter(|r| r.is_confirmed).count() as u32,
                current_skill_level,
            })
        } else {
            None
        };

        Ok(MatchStatistics {
            user_id: user_id.to_string(),
            total_matches: games.len() as u32,
            completed_matches,
            cancelled_matches,
            win_loss: project(&settings, PrivateResource::WinLossRecord, requesting_user_id, win_loss),
            reputation,
            recent_matches: project(&settings, PrivateResource::MatchHistory, requesting_user_id, recent),
            detailed,
        })
    }

    async fn results_by_match(&self, user_id: &str) -> EngineResult<HashMap<Uuid, MatchResult>> {
        Ok(self
            .store
            .results_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| (r.match_id, r))
            .collect())
    }

    async fn history(&self, user_id: &str) -> EngineResult<Vec<MatchHistoryEntry>> {
        let games = self.store.matches_for_user(user_id).await?;
        let results = self.results_by_match(user_id).await?;
        Ok(games
            .iter()
            .map(|game| history_entry(user_id, game, results.get(&game.id)))
            .collect())
    }
}

fn count_status(games: &[Match], status: MatchStatus) -> u32 {
    games.iter().filter(|g| g.status == status).count() as u32
}

fn count_type(games: &[Match], match_type: MatchType) -> u32 {
    games.iter().filter(|g| g.match_type == match_type).count() as u32
}

/// Confirmed results only
fn win_loss<'a>(user_id: &str, results: impl Iterator<Item = &'a MatchResult>) -> WinLossRecord {
    let (mut wins, mut losses) = (0u32, 0u32);
    for result in results.filter(|r| r.is_confirmed) {
        if result.winner_id == user_id {
            wins += 1;
        } else if result.loser_id == user_id {
            losses += 1;
        }
    }
    let played = wins + losses;
    WinLossRecord {
        wins,
        losses,
        win_rate: if played > 0 {
            wins as f64 / played as f64 * 100.0
        } else {
            0.0
        },
    }
}

fn history_entry(user_id: &str, game: &Match, result: Option<&MatchResult>) -> MatchHistoryEntry {
    MatchHistoryEntry {
        match_id: game.id,
        match_type: game.match_type,
        status: game.status,
        opponent_ids: game
            .participant_ids()
            .filter(|id| *id != user_id)
            .map(str::to_string)
            .collect(),
        scheduled_at: game.scheduled_at,
        won: result.filter(|r| r.is_confirmed).map(|r| r.winner_id == user_id),
        score: result.map(|r| r.score.clone()),
        created_at: game.created_at,
    }
}
