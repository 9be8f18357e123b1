use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::reputation::ReputationService;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceStatus, ChatRoom, Match, MatchNotification, MatchParticipant, MatchResult, MatchStatus, MatchType,
    NotificationType, ParticipantStatus,
};
use crate::services::{Notifier, Store, StoreError};

/// Input for an explicitly organised match
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub organizer_id: String,
    pub match_type: MatchType,
    pub invitee_ids: Vec<String>,
    pub court_id: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Match lifecycle: creation, result recording, confirmation and cancellation
pub struct MatchResultService {
    store: Arc<dyn Store>,
    reputation: Arc<ReputationService>,
    notifier: Arc<dyn Notifier>,
    required_confirmations: usize,
}

impl MatchResultService {
    pub fn new(
        store: Arc<dyn Store>,
        reputation: Arc<ReputationService>,
        notifier: Arc<dyn Notifier>,
        required_confirmations: usize,
    ) -> Self {
        Self {
            store,
            reputation,
            notifier,
            required_confirmations: required_confirmations.max(1),
        }
    }

    async fn load_match(&self, match_id: Uuid) -> EngineResult<Match> {
        self.store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::not_found("match", match_id))
    }

    fn ensure_participant(game: &Match, user_id: &str) -> EngineResult<()> {
        if game.is_participant(user_id) {
            Ok(())
        } else {
            Err(EngineError::NotParticipant {
                user_id: user_id.to_string(),
                match_id: game.id,
            })
        }
    }

    /// Persist then dispatch. Notification failures never fail the caller.
    async fn notify(&self, notifications: Vec<MatchNotification>) {
        if notifications.is_empty() {
            return;
        }
        match self.store.insert_notifications(&notifications).await {
            Ok(()) => self.notifier.dispatch_all(&notifications),
            Err(e) => tracing::warn!("Failed to store {} notifications: {}", notifications.len(), e),
        }
    }

    async fn record_attendance(&self, user_id: &str, status: AttendanceStatus) {
        if let Err(e) = self.reputation.update_attendance(user_id, status).await {
            tracing::warn!("Failed to update attendance for {}: {}", user_id, e);
        }
    }

    pub async fn create_match(&self, request: NewMatch) -> EngineResult<Match> {
        if request.organizer_id.is_empty() {
            return Err(EngineError::validation("organizer id is required"));
        }

        let invitees: BTreeSet<&str> = request
            .invitee_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !id.is_empty() && *id != request.organizer_id)
            .collect();
        if invitees.is_empty() {
            return Err(EngineError::validation("a match needs at least one invitee besides the organizer"));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let chat_room = ChatRoom::for_match(id);

        let mut participants = vec![MatchParticipant {
            user_id: request.organizer_id.clone(),
            status: ParticipantStatus::Accepted,
        }];
        participants.extend(invitees.iter().map(|user_id| MatchParticipant {
            user_id: user_id.to_string(),
            status: ParticipantStatus::Invited,
        }));

        let game = Match {
            id,
            match_type: request.match_type,
            status: MatchStatus::Pending,
            organizer_id: Some(request.organizer_id.clone()),
            court_id: request.court_id,
            scheduled_at: request.scheduled_at,
            participants,
            chat_room_id: Some(chat_room.id),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_match(&game).await?;

        tracing::info!(
            "Created {:?} match {} organised by {} with {} invitees",
            game.match_type,
            game.id,
            request.organizer_id,
            invitees.len()
        );

        let notifications = invitees
            .iter()
            .map(|user_id| {
                MatchNotification::new(
                    user_id,
                    NotificationType::MatchInvite,
                    "New match invite",
                    format!("{} invited you to a match", request.organizer_id),
                    serde_json::json!({
                        "matchId": game.id,
                        "chatRoomId": chat_room.id,
                        "organizerId": request.organizer_id,
                    }),
                )
            })
            .collect();
        self.notify(notifications).await;

        Ok(game)
    }

    /// Accept or decline an invite. Only accepted invitees take part in
    /// results, reviews and cancellation.
    pub async fn respond_to_invite(&self, match_id: Uuid, user_id: &str, accept: bool) -> EngineResult<Match> {
        let game = self.load_match(match_id).await?;
        if game.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "match {} is already {:?}",
                match_id, game.status
            )));
        }

        let status = if accept {
            ParticipantStatus::Accepted
        } else {
            ParticipantStatus::Declined
        };
        let updated = self
            .store
            .set_participant_status(match_id, user_id, status)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => EngineError::NotParticipant {
                    user_id: user_id.to_string(),
                    match_id,
                },
                other => other.into(),
            })?;

        tracing::info!("{} answered invite to match {}: {:?}", user_id, match_id, status);
        Ok(updated)
    }

    /// Record the outcome of a match. The recorder counts as the first
    /// confirmation; the result is trusted once enough participants confirmed.
    pub async fn record_match_result(
        &self,
        match_id: Uuid,
        winner_id: &str,
        loser_id: &str,
        score: &str,
        recorded_by: &str,
    ) -> EngineResult<MatchResult> {
        let game = self.load_match(match_id).await?;
        Self::ensure_participant(&game, recorded_by)?;

        if winner_id == loser_id {
            return Err(EngineError::validation("winner and loser must differ"));
        }
        for user_id in [winner_id, loser_id] {
            Self::ensure_participant(&game, user_id)?;
        }
        if score.trim().is_empty() {
            return Err(EngineError::validation("score is required"));
        }
        if game.status == MatchStatus::Cancelled {
            return Err(EngineError::Conflict(format!("match {} was cancelled", match_id)));
        }

        let now = Utc::now();
        let is_confirmed = self.required_confirmations <= 1;
        let result = MatchResult {
            match_id,
            winner_id: winner_id.to_string(),
            loser_id: loser_id.to_string(),
            score: score.trim().to_string(),
            recorded_by: recorded_by.to_string(),
            is_confirmed,
            confirmed_by: vec![recorded_by.to_string()],
            created_at: now,
            confirmed_at: is_confirmed.then_some(now),
        };
        self.store.insert_match_result(&result).await?;

        tracing::info!(
            "Recorded result for match {}: {} beat {} ({})",
            match_id,
            winner_id,
            loser_id,
            result.score
        );

        let notifications = game
            .participant_ids()
            .filter(|user_id| *user_id != recorded_by)
            .map(|user_id| {
                MatchNotification::new(
                    user_id,
                    NotificationType::ResultRecorded,
                    "Match result recorded",
                    format!("{} recorded a result: {}", recorded_by, result.score),
                    serde_json::json!({ "matchId": match_id, "score": result.score }),
                )
            })
            .collect();
        self.notify(notifications).await;

        if is_confirmed {
            self.finalize(&game, &result).await;
        }
        Ok(result)
    }

    /// Confirm a recorded result. Confirming twice is a no-op.
    pub async fn confirm_match_result(&self, match_id: Uuid, user_id: &str) -> EngineResult<MatchResult> {
        let game = self.load_match(match_id).await?;
        Self::ensure_participant(&game, user_id)?;

        let (result, newly_confirmed) = self
            .store
            .confirm_match_result(match_id, user_id, self.required_confirmations)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => EngineError::not_found("match result", match_id),
                other => other.into(),
            })?;

        if newly_confirmed {
            tracing::info!("Result for match {} confirmed by {:?}", match_id, result.confirmed_by);
            self.finalize(&game, &result).await;
        }
        Ok(result)
    }

    /// Side effects of a trusted result. All best-effort.
    async fn finalize(&self, game: &Match, result: &MatchResult) {
        if let Err(e) = self.store.update_match_status(game.id, MatchStatus::Completed).await {
            tracing::warn!("Failed to complete match {}: {}", game.id, e);
        }

        for user_id in [&result.winner_id, &result.loser_id] {
            self.record_attendance(user_id, AttendanceStatus::Completed).await;
            if let Err(e) = self.reputation.adjust_after_result(user_id, game.id).await {
                tracing::warn!("Skill adjustment after match {} failed for {}: {}", game.id, user_id, e);
            }
        }

        let notifications = game
            .participant_ids()
            .map(|user_id| {
                MatchNotification::new(
                    user_id,
                    NotificationType::ResultConfirmed,
                    "Match result confirmed",
                    format!("Final score: {}", result.score),
                    serde_json::json!({
                        "matchId": game.id,
                        "winnerId": result.winner_id,
                        "loserId": result.loser_id,
                        "score": result.score,
                    }),
                )
            })
            .collect();
        self.notify(notifications).await;
    }

    /// Cancel a match that has not finished. The cancelling player's
    /// attendance takes the hit.
    pub async fn cancel_match(&self, match_id: Uuid, user_id: &str) -> EngineResult<Match> {
        let game = self.load_match(match_id).await?;
        Self::ensure_participant(&game, user_id)?;

        if game.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "match {} is already {:?}",
                match_id, game.status
            )));
        }

        let cancelled = self.store.update_match_status(match_id, MatchStatus::Cancelled).await?;
        tracing::info!("Match {} cancelled by {}", match_id, user_id);

        self.record_attendance(user_id, AttendanceStatus::Cancelled).await;
        Ok(cancelled)
    }
}
