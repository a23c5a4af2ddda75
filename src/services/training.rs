use crate::core::forest::{ForestError, ForestParams, RandomForest, INPUT_EXAMPLE_FILE, MODEL_FILE};
use crate::core::table::{ColumnData, FeatureTable, TableError};
use crate::core::{accuracy, preprocess_features, train_test_split, ModelError};
use crate::models::{ModelReference, RunInfo, RunStatus, FEATURE_NAMES, TARGET_NAME};
use crate::services::tracking::{TrackingError, TrackingStore};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Processed Cleveland subset of the UCI heart disease dataset
pub const UCI_CLEVELAND_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/heart-disease/processed.cleveland.data";

const INPUT_EXAMPLE_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Invalid training parameters: {0}")]
    InvalidParams(#[from] ValidationErrors),

    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download dataset: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Failed to parse dataset: {0}")]
    Table(#[from] TableError),

    #[error("Dataset column '{0}' is not numeric")]
    NonNumericColumn(String),

    #[error("Not enough complete rows to split into train and test sets ({0} rows)")]
    TooFewRows(usize),

    #[error("Model training failed: {0}")]
    Forest(#[from] ForestError),

    #[error("Model evaluation failed: {0}")]
    Model(#[from] ModelError),

    #[error("Tracking store error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Failed to serialize input example: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hyperparameters of one training run
#[derive(Debug, Clone, Serialize, Validate)]
pub struct TrainingParams {
    #[validate(range(min = 1, message = "n_estimators must be at least 1"))]
    pub n_estimators: usize,
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0, message = "test_size must be between 0 and 1"))]
    pub test_size: f64,
    pub random_state: u64,
    pub max_depth: Option<usize>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            test_size: 0.2,
            random_state: 42,
            max_depth: None,
        }
    }
}

impl TrainingParams {
    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            random_state: self.random_state,
            ..ForestParams::default()
        }
    }
}

/// Where the training CSV comes from
#[derive(Debug, Clone)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Url(UCI_CLEVELAND_URL.to_string())
    }
}

impl DataSource {
    pub async fn fetch(&self) -> Result<Vec<u8>, TrainingError> {
        match self {
            DataSource::File(path) => tokio::fs::read(path).await.map_err(|source| TrainingError::Io {
                path: path.clone(),
                source,
            }),
            DataSource::Url(url) => {
                tracing::info!(event = "dataset_download_start", url = %url, "Downloading training data");
                let client = reqwest::Client::builder().timeout(Duration::from_secs(60)).build()?;
                let body = client.get(url).send().await?.error_for_status()?.bytes().await?;
                Ok(body.to_vec())
            }
        }
    }
}

/// Feature rows and binary labels ready for fitting
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<i64>,
    /// Rows dropped for a missing feature or target value
    pub dropped: usize,
}

impl Dataset {
    fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<i64>) {
        indices
            .iter()
            .map(|&i| (self.rows[i].clone(), self.labels[i]))
            .unzip()
    }
}

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub experiment_id: String,
    pub run_id: String,
    pub model_uri: String,
    pub accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Parse CSV bytes, with or without a header row.
///
/// Headerless input is read as the 13 features followed by the target.
pub fn parse_dataset(bytes: &[u8]) -> Result<FeatureTable, TrainingError> {
    if has_header_row(bytes) {
        return Ok(FeatureTable::from_csv_reader(bytes, true, None)?);
    }

    let names: Vec<&str> = FEATURE_NAMES.iter().copied().chain([TARGET_NAME]).collect();
    Ok(FeatureTable::from_csv_reader(bytes, false, Some(&names))?)
}

fn has_header_row(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split(',').next())
        .map(|first| first.trim().parse::<f64>().is_err())
        .unwrap_or(false)
}

/// Preprocess features, binarise the target and drop incomplete rows
pub fn prepare_dataset(table: FeatureTable) -> Result<Dataset, TrainingError> {
    let (features, target) = table.split_column(TARGET_NAME)?;
    let features = preprocess_features(features);

    let mut columns = Vec::with_capacity(FEATURE_NAMES.len());
    for name in FEATURE_NAMES {
        let column = features
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        if matches!(column.data, ColumnData::Text(_)) {
            return Err(TrainingError::NonNumericColumn(name.to_string()));
        }
        columns.push(column);
    }
    if matches!(target.data, ColumnData::Text(_)) {
        return Err(TrainingError::NonNumericColumn(TARGET_NAME.to_string()));
    }

    let mut rows = Vec::with_capacity(features.n_rows());
    let mut labels = Vec::with_capacity(features.n_rows());
    let mut dropped = 0;
    for row in 0..features.n_rows() {
        let values: Vec<f64> = columns
            .iter()
            .map(|c| c.data.get_f64(row).unwrap_or(f64::NAN))
            .collect();
        let label = target.data.get_f64(row).unwrap_or(f64::NAN);

        if !label.is_finite() || values.iter().any(|v| !v.is_finite()) {
            dropped += 1;
            continue;
        }
        rows.push(values);
        labels.push(if label > 0.0 { 1 } else { 0 });
    }

    Ok(Dataset {
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        rows,
        labels,
        dropped,
    })
}

/// First rows of the training set in MLflow's split-orient layout
fn input_example(feature_names: &[String], rows: &[Vec<f64>]) -> Result<Vec<u8>, serde_json::Error> {
    let data: Vec<&Vec<f64>> = rows.iter().take(INPUT_EXAMPLE_ROWS).collect();
    serde_json::to_vec_pretty(&json!({ "columns": feature_names, "data": data }))
}

/// Fits a forest and records the run in the tracking store
#[derive(Debug, Clone)]
pub struct Trainer {
    store: Arc<TrackingStore>,
    experiment_name: String,
    model_name: String,
}

impl Trainer {
    pub fn new(store: Arc<TrackingStore>, experiment_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            store,
            experiment_name: experiment_name.into(),
            model_name: model_name.into(),
        }
    }

    /// Fetch the dataset from `source` and train on it
    pub async fn run(&self, params: &TrainingParams, source: &DataSource) -> Result<TrainingReport, TrainingError> {
        params.validate()?;
        let bytes = source.fetch().await?;
        let table = parse_dataset(&bytes)?;
        self.train(params, table).await
    }

    /// Train on an already-loaded table
    pub async fn train(&self, params: &TrainingParams, table: FeatureTable) -> Result<TrainingReport, TrainingError> {
        params.validate()?;

        let dataset = prepare_dataset(table)?;
        tracing::info!(
            event = "dataset_prepared",
            rows = dataset.rows.len(),
            dropped_rows = dataset.dropped,
            "Training data prepared"
        );

        let (train_idx, test_idx) = train_test_split(dataset.rows.len(), params.test_size, params.random_state)
            .ok_or(TrainingError::TooFewRows(dataset.rows.len()))?;

        let experiment = self.store.get_or_create_experiment(&self.experiment_name).await?;
        let run = self.store.create_run(&experiment.experiment_id).await?;
        tracing::info!(
            event = "training_run_start",
            experiment_id = %experiment.experiment_id,
            run_id = %run.run_id,
            "Started training run"
        );

        match self.fit_and_log(&run, params, &dataset, &train_idx, &test_idx).await {
            Ok(acc) => {
                let run = self.store.end_run(&run, RunStatus::Finished).await?;
                let reference = ModelReference::new(&run, self.model_name.as_str());
                tracing::info!(
                    event = "training_run_complete",
                    run_id = %run.run_id,
                    accuracy = acc,
                    model_uri = %reference,
                    "Model trained"
                );
                Ok(TrainingReport {
                    experiment_id: experiment.experiment_id,
                    run_id: run.run_id,
                    model_uri: reference.uri(),
                    accuracy: acc,
                    n_train: train_idx.len(),
                    n_test: test_idx.len(),
                })
            }
            Err(e) => {
                tracing::error!(event = "training_run_failed", run_id = %run.run_id, error_message = %e, "Training run failed");
                if let Err(end_err) = self.store.end_run(&run, RunStatus::Failed).await {
                    tracing::warn!(error_message = %end_err, "Could not mark run as failed");
                }
                Err(e)
            }
        }
    }

    async fn fit_and_log(
        &self,
        run: &RunInfo,
        params: &TrainingParams,
        dataset: &Dataset,
        train_idx: &[usize],
        test_idx: &[usize],
    ) -> Result<f64, TrainingError> {
        let (x_train, y_train) = dataset.subset(train_idx);
        let (x_test, y_test) = dataset.subset(test_idx);

        let forest = RandomForest::fit(&x_train, &y_train, dataset.feature_names.clone(), params.forest_params())?;
        let predicted = x_test
            .iter()
            .map(|row| forest.predict_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        let acc = accuracy(&y_test, &predicted);

        let max_depth = params.max_depth.map(|d| d.to_string()).unwrap_or_else(|| "None".to_string());
        self.store.log_param(run, "n_estimators", &params.n_estimators.to_string()).await?;
        self.store.log_param(run, "test_size", &params.test_size.to_string()).await?;
        self.store.log_param(run, "random_state", &params.random_state.to_string()).await?;
        self.store.log_param(run, "max_depth", &max_depth).await?;
        self.store.log_metric(run, "accuracy", acc).await?;

        self.store
            .log_artifact(run, &format!("{}/{}", self.model_name, MODEL_FILE), forest.to_json()?)
            .await?;
        self.store
            .log_artifact(
                run,
                &format!("{}/{}", self.model_name, INPUT_EXAMPLE_FILE),
                input_example(&dataset.feature_names, &x_train)?,
            )
            .await?;

        Ok(acc)
    }
}
