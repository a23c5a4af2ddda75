use serde::{Deserialize, Serialize};

/// Response for the root health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub status: String,
    pub model_loaded: bool,
}

impl HealthResponse {
    pub fn for_state(model_loaded: bool) -> Self {
        if model_loaded {
            Self {
                message: "Model is up and running".to_string(),
                status: "healthy".to_string(),
                model_loaded,
            }
        } else {
            Self {
                message: "Model not loaded".to_string(),
                status: "unhealthy".to_string(),
                model_loaded,
            }
        }
    }
}

/// Response for the reload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub message: String,
    pub status: String,
    pub previous_model_loaded: bool,
    pub current_model_loaded: bool,
}

/// Error body shared by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
