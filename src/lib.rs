//! Risk Predictor - heart disease risk prediction service
//!
//! Serves a Random Forest classifier over HTTP. Models are trained by the
//! `train` command, logged to an experiment tracking store (a local
//! `mlruns` directory or an MLflow server) and loaded from the newest
//! finished run at startup or on `POST /reload-model`.

pub mod config;
pub mod core;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::config::{Environment, ModelPolicy, Settings};
pub use crate::core::{preprocess_features, Classifier, FeatureTable, RandomForest};
pub use models::{PatientRecord, PredictionResult, RiskLevel};
pub use routes::AppState;
pub use services::{ModelCache, ModelLocator, PredictionService, TrackingStore};
