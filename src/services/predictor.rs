use crate::config::ModelPolicy;
use crate::models::{PatientRecord, PredictionResult};
use crate::services::model_cache::{LoadedModel, ModelCache};
use std::sync::Arc;
use thiserror::Error;

const UNAVAILABLE_AUTO_RELOAD: &str =
    "Model not loaded. Train a model first (risk-predictor train) or call POST /reload-model.";
const UNAVAILABLE_FAIL_FAST: &str =
    "Model not loaded. Call POST /reload-model after training a model.";

/// Errors returned by the prediction path
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
}

/// Scores patient records with whatever model the cache currently holds
#[derive(Debug, Clone)]
pub struct PredictionService {
    cache: Arc<ModelCache>,
    policy: ModelPolicy,
}

impl PredictionService {
    pub fn new(cache: Arc<ModelCache>, policy: ModelPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn policy(&self) -> ModelPolicy {
        self.policy
    }

    pub async fn predict(&self, record: &PatientRecord) -> Result<PredictionResult, PredictionError> {
        let loaded = match self.cache.get() {
            Some(loaded) => loaded,
            None => self.recover().await?,
        };

        let frame = record.to_frame();
        let predictions = loaded.model.predict(&frame).map_err(|e| {
            tracing::error!(event = "prediction_error", error_message = %e, "Model prediction failed");
            PredictionError::PredictionFailed(e.to_string())
        })?;

        let value = predictions
            .first()
            .copied()
            .ok_or_else(|| PredictionError::PredictionFailed("model returned no predictions".into()))?;
        if !value.is_finite() {
            return Err(PredictionError::PredictionFailed(format!(
                "model returned a non-finite value ({})",
                value
            )));
        }

        let result = PredictionResult::from_score(value as i64);
        tracing::info!(
            event = "prediction_complete",
            risk = result.risk,
            risk_level = ?result.risk_level,
            "Prediction complete"
        );
        Ok(result)
    }

    /// Called with an empty cache; may attempt one reload depending on policy
    async fn recover(&self) -> Result<Arc<LoadedModel>, PredictionError> {
        match self.policy {
            ModelPolicy::AutoReload => {
                tracing::warn!(event = "model_auto_reload", "Model not loaded, attempting reload");
                self.cache
                    .load()
                    .await
                    .ok_or_else(|| PredictionError::ServiceUnavailable(UNAVAILABLE_AUTO_RELOAD.to_string()))
            }
            ModelPolicy::FailFast => {
                tracing::warn!(event = "model_unavailable", "Prediction requested without a loaded model");
                Err(PredictionError::ServiceUnavailable(UNAVAILABLE_FAIL_FAST.to_string()))
            }
        }
    }
}
