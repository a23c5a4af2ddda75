use super::{ApiError, AppState};
use crate::middleware::current_correlation_id;
use crate::models::{HealthResponse, PatientRecord, ReloadResponse};
use actix_web::{web, HttpResponse, Responder};

/// Configure the health, prediction and reload routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health_check))
        .route("/health", web::get().to(health_check))
        .route("/healthz", web::get().to(health_check))
        .route("/predict", web::post().to(predict))
        .route("/reload-model", web::post().to(reload_model));
}

/// Health check endpoint
///
/// GET / (also /health and /healthz)
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let loaded = state.predictor.cache().is_loaded();
    HttpResponse::Ok().json(HealthResponse::for_state(loaded))
}

/// Predict heart disease risk for one patient
///
/// POST /predict
///
/// Request body:
/// ```json
/// {
///   "age": 63.0, "sex": 1.0, "cp": 3.0, "trestbps": 145.0, "chol": 233.0,
///   "fbs": 1.0, "restecg": 0.0, "thalach": 150.0, "exang": 0.0,
///   "oldpeak": 2.3, "slope": 0.0, "ca": 0.0, "thal": 1.0
/// }
/// ```
async fn predict(state: web::Data<AppState>, record: web::Json<PatientRecord>) -> Result<HttpResponse, ApiError> {
    tracing::debug!(
        correlation_id = %current_correlation_id().unwrap_or_default(),
        environment = %state.environment,
        "Handling prediction request"
    );
    let result = state.predictor.predict(&record).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Reload the latest model from the tracking store
///
/// POST /reload-model
async fn reload_model(state: web::Data<AppState>) -> impl Responder {
    let outcome = state.predictor.cache().reload().await;

    let (message, status) = if outcome.current_loaded {
        ("Model reloaded successfully", "success")
    } else {
        ("No trained model available. Train a model first.", "no_model")
    };

    HttpResponse::Ok().json(ReloadResponse {
        message: message.to_string(),
        status: status.to_string(),
        previous_model_loaded: outcome.previous_loaded,
        current_model_loaded: outcome.current_loaded,
    })
}
