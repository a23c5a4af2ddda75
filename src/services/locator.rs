use crate::models::ModelReference;
use crate::services::tracking::{TrackingError, TrackingStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// The tracking store could not be queried.
///
/// "Nothing trained yet" is not an error; `locate` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Failed to get latest model: {0}")]
    Infrastructure(#[from] TrackingError),
}

/// Finds the newest finished run of an experiment and builds a reference
/// to the model artifact logged in it
#[derive(Debug, Clone)]
pub struct ModelLocator {
    store: Arc<TrackingStore>,
    experiment_name: String,
    model_name: String,
}

impl ModelLocator {
    pub fn new(store: Arc<TrackingStore>, experiment_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            store,
            experiment_name: experiment_name.into(),
            model_name: model_name.into(),
        }
    }

    pub fn store(&self) -> &Arc<TrackingStore> {
        &self.store
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Locate the configured model
    pub async fn locate(&self) -> Result<Option<ModelReference>, LocatorError> {
        self.locate_named(&self.experiment_name, &self.model_name).await
    }

    /// Locate `model_name` in the newest finished run of `experiment_name`
    pub async fn locate_named(
        &self,
        experiment_name: &str,
        model_name: &str,
    ) -> Result<Option<ModelReference>, LocatorError> {
        let started = Instant::now();
        tracing::info!(
            event = "model_path_retrieval_start",
            experiment_name,
            model_name,
            mlflow_uri = %self.store.uri(),
            "Starting model path retrieval"
        );

        let result = self.search(experiment_name, model_name).await;

        match &result {
            Ok(Some(reference)) => tracing::info!(
                event = "model_path_found",
                model_uri = %reference,
                run_id = %reference.run_id,
                run_start_time = reference.start_time,
                experiment_name,
                model_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Successfully found latest model"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(
                event = "model_path_error",
                experiment_name,
                model_name,
                error_message = %e,
                "Failed to retrieve model path"
            ),
        }

        result
    }

    async fn search(&self, experiment_name: &str, model_name: &str) -> Result<Option<ModelReference>, LocatorError> {
        tracing::debug!(experiment_name, "Searching for experiment");
        let Some(experiment) = self.store.get_experiment_by_name(experiment_name).await? else {
            tracing::warn!(
                event = "experiment_not_found",
                experiment_name,
                "Experiment not found, no model has been trained yet"
            );
            return Ok(None);
        };

        tracing::debug!(
            experiment_id = %experiment.experiment_id,
            experiment_name,
            "Found experiment, searching for latest run"
        );
        let Some(run) = self.store.search_latest_run(&experiment.experiment_id).await? else {
            tracing::warn!(
                event = "no_runs_found",
                experiment_name,
                experiment_id = %experiment.experiment_id,
                "No finished runs found in experiment"
            );
            return Ok(None);
        };

        Ok(Some(ModelReference::new(&run, model_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunInfo, RunStatus};
    use crate::services::tracking::FileStore;
    use std::path::Path;

    fn write_run(root: &Path, experiment_id: &str, run_id: &str, start_time: i64, status: RunStatus) {
        let dir = root.join(experiment_id).join(run_id);
        std::fs::create_dir_all(&dir).unwrap();
        let run = RunInfo {
            run_id: run_id.to_string(),
            experiment_id: experiment_id.to_string(),
            start_time,
            end_time: None,
            status,
        };
        std::fs::write(dir.join("meta.json"), serde_json::to_vec(&run).unwrap()).unwrap();
    }

    fn write_experiment(root: &Path, experiment_id: &str, name: &str) {
        let dir = root.join(experiment_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("meta.json"),
            serde_json::json!({"experiment_id": experiment_id, "name": name}).to_string(),
        )
        .unwrap();
    }

    fn locator(root: &Path) -> ModelLocator {
        ModelLocator::new(
            Arc::new(TrackingStore::File(FileStore::new(root))),
            "patient_risk_prediction",
            "random_forest_model",
        )
    }

    #[tokio::test]
    async fn test_missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = locator(&dir.path().join("does-not-exist")).locate().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_experiment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_experiment(dir.path(), "1", "some_other_experiment");
        assert!(locator(dir.path()).locate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_experiment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_experiment(dir.path(), "1", "patient_risk_prediction");
        assert!(locator(dir.path()).locate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_run_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_experiment(dir.path(), "1", "patient_risk_prediction");
        write_run(dir.path(), "1", "run_t1", 1_000, RunStatus::Finished);
        write_run(dir.path(), "1", "run_t3", 3_000, RunStatus::Finished);
        write_run(dir.path(), "1", "run_t2", 2_000, RunStatus::Finished);
        write_run(dir.path(), "1", "run_failed", 4_000, RunStatus::Failed);

        let reference = locator(dir.path()).locate().await.unwrap().unwrap();
        assert_eq!(reference.run_id, "run_t3");
        assert_eq!(reference.uri(), "runs:/run_t3/random_forest_model");
    }

    #[tokio::test]
    async fn test_custom_names() {
        let dir = tempfile::tempdir().unwrap();
        write_experiment(dir.path(), "7", "custom_experiment");
        write_run(dir.path(), "7", "custom_run_789", 10, RunStatus::Finished);

        let reference = locator(dir.path())
            .locate_named("custom_experiment", "custom_model")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reference.uri(), "runs:/custom_run_789/custom_model");
    }

    #[tokio::test]
    async fn test_unreadable_store_is_infrastructure_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("mlruns");
        std::fs::write(&not_a_dir, "plain file").unwrap();

        let result = locator(&not_a_dir).locate().await;
        assert!(matches!(result, Err(LocatorError::Infrastructure(_))));
    }
}
