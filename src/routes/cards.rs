use actix_web::{web, HttpResponse};

use crate::error::EngineError;
use crate::models::{CardAction, CardActionRequest};
use crate::routes::{validate, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/cards/action", web::post().to(card_action));
}

/// Record a swipe
///
/// POST /api/v1/cards/action
///
/// Request body:
/// ```json
/// { "actorId": "string", "targetId": "string", "action": "like|dislike|skip" }
/// ```
async fn card_action(
    state: web::Data<AppState>,
    req: web::Json<CardActionRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let action: CardAction = req.action.parse().map_err(EngineError::Validation)?;

    let result = state
        .engine
        .cards
        .process_card_action(&req.actor_id, &req.target_id, action)
        .await?;

    tracing::debug!("Card {} -> {} ({}): {}", req.actor_id, req.target_id, action.as_str(), result.message);

    Ok(HttpResponse::Ok().json(result))
}
