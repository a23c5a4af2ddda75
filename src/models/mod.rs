// Model exports
pub mod domain;
pub mod patient;
pub mod responses;

pub use domain::{Experiment, ModelReference, PredictionResult, RiskLevel, RunInfo, RunStatus};
pub use patient::{PatientRecord, FEATURE_NAMES, TARGET_NAME};
pub use responses::{ErrorResponse, HealthResponse, ReloadResponse};
