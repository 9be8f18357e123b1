use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{CardAction, CardInteraction, CardMatchResult};
use crate::services::{Notifier, Store};

pub const MESSAGE_SKIPPED: &str = "skipped";
pub const MESSAGE_AWAITING: &str = "interest recorded, awaiting response";
pub const MESSAGE_MATCHED: &str = "matched";
pub const MESSAGE_ALREADY_MATCHED: &str = "already matched";

/// Swipe handling and mutual-match detection.
///
/// Pair state: no interaction -> one-sided like -> mutual match. Dislike and
/// skip leave the pair without a match. The match itself is created by
/// `Store::create_mutual_match`, which is atomic per pair, so two reciprocal
/// likes racing each other both end up with the same match id.
pub struct CardService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl CardService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn already_matched(&self, match_id: Uuid) -> EngineResult<CardMatchResult> {
        let chat_room_id = self
            .store
            .get_match(match_id)
            .await?
            .and_then(|game| game.chat_room_id);

        Ok(CardMatchResult {
            is_match: true,
            match_id: Some(match_id),
            chat_room_id,
            message: MESSAGE_ALREADY_MATCHED.to_string(),
        })
    }

    pub async fn process_card_action(
        &self,
        actor_id: &str,
        target_id: &str,
        action: CardAction,
    ) -> EngineResult<CardMatchResult> {
        if actor_id.is_empty() || target_id.is_empty() {
            return Err(EngineError::validation("actor and target ids are required"));
        }
        if actor_id == target_id {
            return Err(EngineError::validation("cannot act on your own card"));
        }

        if let Some(existing) = self.store.find_card_interaction(actor_id, target_id).await? {
            if let (true, Some(match_id)) = (existing.is_match, existing.match_id) {
                return self.already_matched(match_id).await;
            }
        }

        let row = self
            .store
            .upsert_card_interaction(CardInteraction::new(actor_id, target_id, action))
            .await?;
        if let (true, Some(match_id)) = (row.is_match, row.match_id) {
            return self.already_matched(match_id).await;
        }

        if action != CardAction::Like {
            tracing::debug!("{} passed on {} ({})", actor_id, target_id, action.as_str());
            return Ok(CardMatchResult {
                is_match: false,
                match_id: None,
                chat_room_id: None,
                message: MESSAGE_SKIPPED.to_string(),
            });
        }

        let awaiting = CardMatchResult {
            is_match: false,
            match_id: None,
            chat_room_id: None,
            message: MESSAGE_AWAITING.to_string(),
        };

        let reverse_like = self
            .store
            .find_card_interaction(target_id, actor_id)
            .await?
            .map(|r| r.action == CardAction::Like)
            .unwrap_or(false);
        if !reverse_like {
            return Ok(awaiting);
        }

        let Some(mutual) = self.store.create_mutual_match(actor_id, target_id).await? else {
            return Ok(awaiting);
        };

        if mutual.created {
            tracing::info!("Mutual match {} between {} and {}", mutual.game.id, actor_id, target_id);
            self.notifier.dispatch_all(&mutual.notifications);
        } else {
            tracing::debug!("Mutual match {} already existed for {} and {}", mutual.game.id, actor_id, target_id);
        }

        Ok(CardMatchResult {
            is_match: true,
            match_id: Some(mutual.game.id),
            chat_room_id: Some(mutual.chat_room.id),
            message: MESSAGE_MATCHED.to_string(),
        })
    }
}
