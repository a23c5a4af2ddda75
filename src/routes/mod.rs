// Route exports
pub mod api;
pub mod docs;

use crate::config::Environment;
use crate::models::ErrorResponse;
use crate::services::{PredictionError, PredictionService};
use actix_web::http::StatusCode;
use actix_web::{error, web, HttpRequest, HttpResponse, ResponseError};
use std::sync::Arc;
use thiserror::Error;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictionService>,
    pub environment: Environment,
}

impl AppState {
    pub fn new(predictor: Arc<PredictionService>, environment: Environment) -> Self {
        Self { predictor, environment }
    }
}

/// Errors surfaced by HTTP handlers, rendered as `{"detail": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(PredictionError::ServiceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Prediction(PredictionError::PredictionFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

/// Map JSON extraction failures (malformed body, missing or invalid fields) to 422
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!(
        event = "validation_error",
        path = %req.path(),
        error_message = %err,
        "Rejected request payload"
    );
    ApiError::Validation(err.to_string()).into()
}

/// JSON extractor config used by every app instance
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(handle_json_payload_error)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(api::configure).configure(docs::configure);
}
