// Service exports
pub mod locator;
pub mod model_cache;
pub mod predictor;
pub mod tracking;
pub mod training;

pub use locator::{LocatorError, ModelLocator};
pub use model_cache::{LoadError, LoadedModel, ModelCache, ReloadOutcome};
pub use predictor::{PredictionError, PredictionService};
pub use tracking::{FileStore, RestStore, TrackingError, TrackingStore};
pub use training::{DataSource, Trainer, TrainingError, TrainingParams, TrainingReport};
