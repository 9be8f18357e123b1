use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::engine::NewMatch;
use crate::error::EngineError;
use crate::models::{
    ActingUserRequest, CreateMatchRequest, FindMatchesRequest, FindMatchesResponse, HealthResponse,
    InviteResponseRequest, RandomMatchesRequest, RecordResultRequest,
};
use crate::routes::{validate, AppState};

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches))
        .route("/matches/random", web::post().to(find_random_matches))
        .route("/matches", web::post().to(create_match))
        .route("/matches/{match_id}/respond", web::post().to(respond_to_invite))
        .route("/matches/{match_id}/result", web::post().to(record_result))
        .route("/matches/{match_id}/confirm", web::post().to(confirm_result))
        .route("/matches/{match_id}/cancel", web::post().to(cancel_match));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "minSkillLevel": 3.5,
///   "maxSkillLevel": 4.5,
///   "maxDistanceKm": 10,
///   "limit": 20,
///   "includeBreakdown": true
/// }
/// ```
async fn find_matches(
    state: web::Data<AppState>,
    req: web::Json<FindMatchesRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let criteria = req.to_criteria()?;

    tracing::info!("Finding matches for user: {}, limit: {}", criteria.requester_id, criteria.limit);

    let outcome = state
        .engine
        .matching
        .find_matches(&criteria, req.include_breakdown)
        .await?;

    Ok(HttpResponse::Ok().json(FindMatchesResponse {
        matches: outcome.results,
        total_candidates: outcome.total_candidates,
        eligible_candidates: outcome.eligible_candidates,
    }))
}

/// Randomized discovery endpoint
///
/// POST /api/v1/matches/random
///
/// Same body as `/matches/find` plus `count` and an optional `seed`.
async fn find_random_matches(
    state: web::Data<AppState>,
    req: web::Json<RandomMatchesRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let criteria = req.criteria.to_criteria()?;

    let outcome = state
        .engine
        .matching
        .find_random_matches(&criteria, req.count as usize, req.seed, req.criteria.include_breakdown)
        .await?;

    Ok(HttpResponse::Ok().json(FindMatchesResponse {
        matches: outcome.results,
        total_candidates: outcome.total_candidates,
        eligible_candidates: outcome.eligible_candidates,
    }))
}

/// POST /api/v1/matches
async fn create_match(
    state: web::Data<AppState>,
    req: web::Json<CreateMatchRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let req = req.into_inner();

    let game = state
        .engine
        .results
        .create_match(NewMatch {
            organizer_id: req.organizer_id,
            match_type: req.match_type,
            invitee_ids: req.invitee_ids,
            court_id: req.court_id,
            scheduled_at: req.scheduled_at,
        })
        .await?;

    Ok(HttpResponse::Created().json(game))
}

/// POST /api/v1/matches/{match_id}/result
async fn record_result(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<RecordResultRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let result = state
        .engine
        .results
        .record_match_result(path.into_inner(), &req.winner_id, &req.loser_id, &req.score, &req.recorded_by)
        .await?;

    Ok(HttpResponse::Created().json(result))
}

/// POST /api/v1/matches/{match_id}/confirm
async fn confirm_result(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ActingUserRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let result = state
        .engine
        .results
        .confirm_match_result(path.into_inner(), &req.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/v1/matches/{match_id}/cancel
async fn respond_to_invite(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<InviteResponseRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let game = state
        .engine
        .results
        .respond_to_invite(path.into_inner(), &req.user_id, req.accept)
        .await?;

    Ok(HttpResponse::Ok().json(game))
}

async fn cancel_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ActingUserRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let game = state
        .engine
        .results
        .cancel_match(path.into_inner(), &req.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(game))
}
