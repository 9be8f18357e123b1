// Route exports
pub mod cards;
pub mod matches;
pub mod users;

use actix_web::error::{InternalError, JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use std::sync::Arc;
use validator::Validate;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::ErrorResponse;
use crate::services::{Store, StoreError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn Store>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(cards::configure)
            .configure(users::configure),
    );
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::PrivacyDenied(_) | EngineError::NotParticipant { .. } => StatusCode::FORBIDDEN,
            EngineError::NotFound { .. } | EngineError::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Storage(_) | EngineError::Profile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

fn bad_request<E>(err: E, error: &str, message: String) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: 400,
    });
    InternalError::from_response(err, response).into()
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    let message = format!("Invalid JSON: {}", err);
    bad_request(err, "invalid_json", message)
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    let message = format!("Invalid query: {}", err);
    bad_request(err, "invalid_query", message)
}

/// Handle malformed path segments such as a non-UUID match id
pub fn handle_path_error(err: PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    let message = format!("Invalid path: {}", err);
    bad_request(err, "invalid_path", message)
}

/// Run the derive-based validation on a request body
pub(crate) fn validate<T: Validate>(request: &T) -> Result<(), EngineError> {
    request.validate().map_err(|errors| {
        tracing::info!("Validation failed: {}", errors);
        EngineError::validation(errors.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrivateResource;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            EngineError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::PrivacyDenied(PrivateResource::MatchHistory).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            EngineError::not_found("match", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::Conflict("dup".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            EngineError::Storage(StoreError::NotFound("match x".to_string())).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
