use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::engine::ReputationFeedback;
use crate::error::EngineError;
use crate::models::{
    ActingUserRequest, BehaviorReviewRequest, NotificationQuery, RequesterQuery, SkillAccuracyRequest,
    SkillLevelRequest, UpdatePrivacyRequest, UpdateReputationRequest,
};
use crate::routes::{validate, AppState};

/// Configure per-user reputation, statistics, privacy and inbox routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users/{user_id}/reputation", web::get().to(get_reputation))
        .route("/users/{user_id}/reputation", web::post().to(update_reputation))
        .route("/users/{user_id}/reviews", web::get().to(get_reviews))
        .route("/users/{user_id}/reviews", web::post().to(submit_review))
        .route("/users/{user_id}/skill-level", web::put().to(set_skill_level))
        .route("/users/{user_id}/skill-level/auto-adjust", web::post().to(auto_adjust_skill_level))
        .route("/users/{user_id}/skill-accuracy", web::post().to(record_skill_accuracy))
        .route("/users/{user_id}/skill-progression", web::get().to(get_skill_progression))
        .route("/users/{user_id}/statistics", web::get().to(get_statistics))
        .route("/users/{user_id}/history", web::get().to(get_history))
        .route("/users/{user_id}/privacy", web::get().to(get_privacy))
        .route("/users/{user_id}/privacy", web::put().to(update_privacy))
        .route("/users/{user_id}/notifications", web::get().to(list_notifications))
        .route("/notifications/{notification_id}/read", web::post().to(mark_notification_read));
}

/// GET /api/v1/users/{user_id}/reputation?requestingUserId={id}
async fn get_reputation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse, EngineError> {
    let score = state
        .engine
        .statistics
        .get_reputation_score(&path, &query.requesting_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(score))
}

/// Post-match feedback
///
/// POST /api/v1/users/{user_id}/reputation
///
/// Request body:
/// ```json
/// { "matchCompleted": true, "wasOnTime": false, "delayMinutes": 12, "behaviorRating": 4.5 }
/// ```
async fn update_reputation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<UpdateReputationRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let score = state
        .engine
        .reputation
        .update_reputation(
            &path,
            ReputationFeedback {
                match_completed: req.match_completed,
                was_on_time: req.was_on_time,
                delay_minutes: req.delay_minutes,
                behavior_rating: req.behavior_rating,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(score))
}

/// GET /api/v1/users/{user_id}/reviews?requestingUserId={id}
async fn get_reviews(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse, EngineError> {
    let reviews = state
        .engine
        .statistics
        .get_behavior_reviews(&path, &query.requesting_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(reviews))
}

/// POST /api/v1/users/{user_id}/reviews
async fn submit_review(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<BehaviorReviewRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let req = req.into_inner();

    let score = state
        .engine
        .reputation
        .submit_behavior_review(&path, &req.reviewer_id, req.match_id, req.rating, req.comment)
        .await?;
    Ok(HttpResponse::Created().json(score))
}

/// PUT /api/v1/users/{user_id}/skill-level
async fn set_skill_level(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<SkillLevelRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;
    let req = req.into_inner();

    let record = state
        .engine
        .reputation
        .manually_adjust_skill_level(&path, req.level, req.reason)
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// POST /api/v1/users/{user_id}/skill-level/auto-adjust
///
/// Responds with the new audit record, or `{"adjusted": false}` when there
/// was not enough evidence to move the level.
async fn auto_adjust_skill_level(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    match state.engine.reputation.auto_adjust_skill_level(&path).await? {
        Some(record) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "adjusted": true,
            "record": record,
        }))),
        None => Ok(HttpResponse::Ok().json(serde_json::json!({ "adjusted": false }))),
    }
}

/// POST /api/v1/users/{user_id}/skill-accuracy
async fn record_skill_accuracy(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<SkillAccuracyRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let score = state
        .engine
        .reputation
        .update_skill_accuracy(&path, req.reported_level, req.observed_level, req.match_id)
        .await?;
    Ok(HttpResponse::Ok().json(score))
}

/// GET /api/v1/users/{user_id}/skill-progression?requestingUserId={id}
async fn get_skill_progression(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse, EngineError> {
    let history = state
        .engine
        .statistics
        .get_skill_progression(&path, &query.requesting_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(history))
}

/// GET /api/v1/users/{user_id}/statistics?requestingUserId={id}
async fn get_statistics(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse, EngineError> {
    let stats = state
        .engine
        .statistics
        .get_user_match_statistics(&path, &query.requesting_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/v1/users/{user_id}/history?requestingUserId={id}
async fn get_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RequesterQuery>,
) -> Result<HttpResponse, EngineError> {
    let history = state
        .engine
        .statistics
        .get_match_history(&path, &query.requesting_user_id)
        .await?;
    Ok(HttpResponse::Ok().json(history))
}

/// GET /api/v1/users/{user_id}/privacy
async fn get_privacy(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, EngineError> {
    let settings = state.engine.statistics.get_privacy_settings(&path).await?;
    Ok(HttpResponse::Ok().json(settings))
}

/// PUT /api/v1/users/{user_id}/privacy
async fn update_privacy(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<UpdatePrivacyRequest>,
) -> Result<HttpResponse, EngineError> {
    let settings = state.engine.statistics.update_privacy_settings(&path, &req).await?;
    Ok(HttpResponse::Ok().json(settings))
}

/// GET /api/v1/users/{user_id}/notifications?unreadOnly=true
async fn list_notifications(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, EngineError> {
    let notifications = state
        .engine
        .notifications
        .list_notifications(&path, query.unread_only)
        .await?;
    Ok(HttpResponse::Ok().json(notifications))
}

/// POST /api/v1/notifications/{notification_id}/read
async fn mark_notification_read(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ActingUserRequest>,
) -> Result<HttpResponse, EngineError> {
    validate(&*req)?;

    let notification = state
        .engine
        .notifications
        .mark_notification_read(path.into_inner(), &req.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}
