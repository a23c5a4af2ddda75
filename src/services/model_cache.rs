use crate::core::forest::{ForestError, RandomForest, MODEL_FILE};
use crate::core::Classifier;
use crate::models::ModelReference;
use crate::services::locator::{LocatorError, ModelLocator};
use crate::services::tracking::TrackingError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while resolving and decoding a model
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("Failed to download model artifact: {0}")]
    Artifact(#[from] TrackingError),

    #[error("Failed to decode model artifact: {0}")]
    Decode(#[from] ForestError),
}

/// A classifier held in memory together with where it came from
pub struct LoadedModel {
    pub model: Arc<dyn Classifier>,
    /// `None` for models installed directly rather than loaded from the store
    pub reference: Option<ModelReference>,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(model: Arc<dyn Classifier>, reference: Option<ModelReference>) -> Self {
        Self {
            model,
            reference,
            loaded_at: Utc::now(),
        }
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model", &self.model.describe())
            .field("reference", &self.reference)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Loaded state before and after a reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub previous_loaded: bool,
    pub current_loaded: bool,
}

/// Single-slot holder for the serving model.
///
/// Readers clone an `Arc` out of the slot, so a concurrent reload never
/// exposes a half-built model; loads are serialised with an async mutex.
pub struct ModelCache {
    slot: RwLock<Option<Arc<LoadedModel>>>,
    locator: ModelLocator,
    load_lock: tokio::sync::Mutex<()>,
}

impl ModelCache {
    /// Create an empty cache; nothing is loaded until `load` runs
    pub fn new(locator: ModelLocator) -> Self {
        Self {
            slot: RwLock::new(None),
            locator,
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn locator(&self) -> &ModelLocator {
        &self.locator
    }

    /// Current model, if any
    pub fn get(&self) -> Option<Arc<LoadedModel>> {
        self.slot.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Replace the slot with an already-built classifier
    pub fn install(&self, model: Arc<dyn Classifier>) -> Arc<LoadedModel> {
        let loaded = Arc::new(LoadedModel::new(model, None));
        *self.slot.write() = Some(loaded.clone());
        loaded
    }

    pub fn clear(&self) {
        self.slot.write().take();
    }

    /// Resolve the latest model through the locator and swap it in.
    ///
    /// Returns the model loaded by this call. When the store has no trained
    /// model the slot is emptied. Store or artifact failures are logged and
    /// leave the current model in place.
    pub async fn load(&self) -> Option<Arc<LoadedModel>> {
        let _guard = self.load_lock.lock().await;
        self.load_locked().await
    }

    /// Caller must hold `load_lock`
    async fn load_locked(&self) -> Option<Arc<LoadedModel>> {
        match self.fetch().await {
            Ok(Some(loaded)) => {
                let loaded = Arc::new(loaded);
                *self.slot.write() = Some(loaded.clone());
                tracing::info!(
                    event = "model_loaded",
                    model = %loaded.model.describe(),
                    model_uri = %loaded.reference.as_ref().map(|r| r.uri()).unwrap_or_default(),
                    "Model loaded"
                );
                Some(loaded)
            }
            Ok(None) => {
                let dropped = self.slot.write().take().is_some();
                tracing::warn!(
                    event = "model_not_found",
                    experiment_name = self.locator.experiment_name(),
                    dropped_previous = dropped,
                    "No trained model available"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    event = "model_load_error",
                    error_message = %e,
                    retained_previous = self.is_loaded(),
                    "Model loading failed"
                );
                None
            }
        }
    }

    /// Run `load` again and report the loaded state on either side.
    ///
    /// Both states are read under the load lock, so concurrent reloads report
    /// the state each one actually replaced.
    pub async fn reload(&self) -> ReloadOutcome {
        let outcome = {
            let _guard = self.load_lock.lock().await;
            let previous_loaded = self.is_loaded();
            tracing::info!(event = "model_reload_start", previous_model_loaded = previous_loaded, "Reloading model");

            self.load_locked().await;
            ReloadOutcome {
                previous_loaded,
                current_loaded: self.is_loaded(),
            }
        };
        tracing::info!(
            event = "model_reload_complete",
            previous_model_loaded = outcome.previous_loaded,
            current_model_loaded = outcome.current_loaded,
            "Model reload finished"
        );
        outcome
    }

    async fn fetch(&self) -> Result<Option<LoadedModel>, LoadError> {
        let Some(reference) = self.locator.locate().await? else {
            return Ok(None);
        };

        let path = format!("{}/{}", reference.artifact_path, MODEL_FILE);
        let bytes = self
            .locator
            .store()
            .download_artifact(&reference.experiment_id, &reference.run_id, &path)
            .await?;
        let forest = RandomForest::from_json(&bytes)?;

        Ok(Some(LoadedModel::new(Arc::new(forest), Some(reference))))
    }
}

impl fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("loaded", &self.is_loaded())
            .field("locator", &self.locator)
            .finish()
    }
}
