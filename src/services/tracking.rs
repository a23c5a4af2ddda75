use crate::models::{Experiment, RunInfo, RunStatus};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const META_FILE: &str = "meta.json";

/// Errors that can occur when talking to the tracking store
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Tracking server returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt tracking data at {0}")]
    Corrupt(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Invalid tracking URI '{0}'")]
    InvalidUri(String),

    #[error("Invalid path component '{0}'")]
    InvalidPath(String),
}

impl TrackingError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TrackingError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Experiment tracking backend, selected by URI scheme.
///
/// `file://` URIs and bare paths use the local directory store; `http(s)://`
/// URIs talk to an MLflow tracking server over its REST API.
#[derive(Debug, Clone)]
pub enum TrackingStore {
    File(FileStore),
    Rest(RestStore),
}

impl TrackingStore {
    pub fn from_uri(uri: &str) -> Result<Self, TrackingError> {
        let trimmed = uri.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(TrackingStore::Rest(RestStore::new(trimmed)?));
        }
        if let Some(path) = trimmed.strip_prefix("file://") {
            if path.is_empty() {
                return Err(TrackingError::InvalidUri(uri.to_string()));
            }
            return Ok(TrackingStore::File(FileStore::new(path)));
        }
        if trimmed.is_empty() || trimmed.contains("://") {
            return Err(TrackingError::InvalidUri(uri.to_string()));
        }
        Ok(TrackingStore::File(FileStore::new(trimmed)))
    }

    pub fn uri(&self) -> String {
        match self {
            TrackingStore::File(store) => format!("file://{}", store.root.display()),
            TrackingStore::Rest(store) => store.base_url.clone(),
        }
    }

    /// `Ok(None)` when the store has no experiment with this name
    pub async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, TrackingError> {
        match self {
            TrackingStore::File(store) => store.get_experiment_by_name(name).await,
            TrackingStore::Rest(store) => store.get_experiment_by_name(name).await,
        }
    }

    /// Most recent finished run of the experiment by start time
    pub async fn search_latest_run(&self, experiment_id: &str) -> Result<Option<RunInfo>, TrackingError> {
        match self {
            TrackingStore::File(store) => store.search_latest_run(experiment_id).await,
            TrackingStore::Rest(store) => store.search_latest_run(experiment_id).await,
        }
    }

    pub async fn download_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        path: &str,
    ) -> Result<Vec<u8>, TrackingError> {
        match self {
            TrackingStore::File(store) => store.download_artifact(experiment_id, run_id, path).await,
            TrackingStore::Rest(store) => store.download_artifact(run_id, path).await,
        }
    }

    pub async fn create_experiment(&self, name: &str) -> Result<Experiment, TrackingError> {
        match self {
            TrackingStore::File(store) => store.create_experiment(name).await,
            TrackingStore::Rest(store) => store.create_experiment(name).await,
        }
    }

    pub async fn get_or_create_experiment(&self, name: &str) -> Result<Experiment, TrackingError> {
        match self.get_experiment_by_name(name).await? {
            Some(experiment) => Ok(experiment),
            None => {
                tracing::info!(event = "experiment_created", experiment_name = name, "Creating experiment");
                self.create_experiment(name).await
            }
        }
    }

    pub async fn create_run(&self, experiment_id: &str) -> Result<RunInfo, TrackingError> {
        match self {
            TrackingStore::File(store) => store.create_run(experiment_id).await,
            TrackingStore::Rest(store) => store.create_run(experiment_id).await,
        }
    }

    pub async fn log_param(&self, run: &RunInfo, key: &str, value: &str) -> Result<(), TrackingError> {
        match self {
            TrackingStore::File(store) => store.log_param(run, key, value).await,
            TrackingStore::Rest(store) => store.log_param(run, key, value).await,
        }
    }

    pub async fn log_metric(&self, run: &RunInfo, key: &str, value: f64) -> Result<(), TrackingError> {
        match self {
            TrackingStore::File(store) => store.log_metric(run, key, value).await,
            TrackingStore::Rest(store) => store.log_metric(run, key, value).await,
        }
    }

    pub async fn log_artifact(&self, run: &RunInfo, path: &str, bytes: Vec<u8>) -> Result<(), TrackingError> {
        match self {
            TrackingStore::File(store) => store.log_artifact(run, path, bytes).await,
            TrackingStore::Rest(store) => store.log_artifact(run, path, bytes).await,
        }
    }

    pub async fn end_run(&self, run: &RunInfo, status: RunStatus) -> Result<RunInfo, TrackingError> {
        match self {
            TrackingStore::File(store) => store.end_run(run, status).await,
            TrackingStore::Rest(store) => store.end_run(run, status).await,
        }
    }
}

/// Reject ids and keys that could escape their directory
fn safe_component(value: &str) -> Result<&str, TrackingError> {
    let ok = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);
    if ok {
        Ok(value)
    } else {
        Err(TrackingError::InvalidPath(value.to_string()))
    }
}

/// Relative artifact path made only of normal components
fn safe_relative(path: &str) -> Result<PathBuf, TrackingError> {
    let relative = Path::new(path);
    let normal = !path.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if normal {
        Ok(relative.to_path_buf())
    } else {
        Err(TrackingError::InvalidPath(path.to_string()))
    }
}

/// Local directory store.
///
/// Layout: `<root>/<experiment_id>/meta.json` and
/// `<root>/<experiment_id>/<run_id>/{meta.json,params/,metrics/,artifacts/}`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dir(&self, experiment_id: &str) -> Result<PathBuf, TrackingError> {
        Ok(self.root.join(safe_component(experiment_id)?))
    }

    fn run_dir(&self, experiment_id: &str, run_id: &str) -> Result<PathBuf, TrackingError> {
        Ok(self.experiment_dir(experiment_id)?.join(safe_component(run_id)?))
    }

    /// Subdirectories of `dir` that carry a meta file, decoded as `T`
    async fn read_metas<T>(&self, dir: &Path) -> Result<Vec<T>, TrackingError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut entries = fs::read_dir(dir).await.map_err(|e| TrackingError::io(dir, e))?;
        let mut metas = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| TrackingError::io(dir, e))? {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| TrackingError::io(&entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }

            let meta_path = entry.path().join(META_FILE);
            let bytes = match fs::read(&meta_path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(TrackingError::io(&meta_path, e)),
            };
            let meta = serde_json::from_slice(&bytes)
                .map_err(|e| TrackingError::Corrupt(format!("{}: {}", meta_path.display(), e)))?;
            metas.push(meta);
        }
        Ok(metas)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), TrackingError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| TrackingError::Corrupt(format!("{}: {}", path.display(), e)))?;
        fs::write(path, bytes).await.map_err(|e| TrackingError::io(path, e))
    }

    async fn create_dir(&self, path: &Path) -> Result<(), TrackingError> {
        fs::create_dir_all(path).await.map_err(|e| TrackingError::io(path, e))
    }

    pub async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, TrackingError> {
        match fs::metadata(&self.root).await {
            Ok(_) => {}
            // Nothing has been tracked yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TrackingError::io(&self.root, e)),
        }

        let experiments: Vec<Experiment> = self.read_metas(&self.root).await?;
        Ok(experiments.into_iter().find(|e| e.name == name))
    }

    pub async fn search_latest_run(&self, experiment_id: &str) -> Result<Option<RunInfo>, TrackingError> {
        let dir = self.experiment_dir(experiment_id)?;
        let runs: Vec<RunInfo> = self.read_metas(&dir).await?;

        Ok(runs
            .into_iter()
            .filter(|r| r.status == RunStatus::Finished)
            .max_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.run_id.cmp(&b.run_id))))
    }

    pub async fn download_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        path: &str,
    ) -> Result<Vec<u8>, TrackingError> {
        let full = self
            .run_dir(experiment_id, run_id)?
            .join("artifacts")
            .join(safe_relative(path)?);

        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TrackingError::ArtifactNotFound(format!("runs:/{}/{}", run_id, path)))
            }
            Err(e) => Err(TrackingError::io(&full, e)),
        }
    }

    pub async fn create_experiment(&self, name: &str) -> Result<Experiment, TrackingError> {
        self.create_dir(&self.root).await?;
        let existing: Vec<Experiment> = self.read_metas(&self.root).await?;
        if existing.iter().any(|e| e.name == name) {
            return Err(TrackingError::ApiError {
                status: 409,
                message: format!("Experiment '{}' already exists", name),
            });
        }

        let next_id = existing
            .iter()
            .filter_map(|e| e.experiment_id.parse::<u64>().ok())
            .max()
            .map_or(1, |id| id + 1);

        let experiment = Experiment {
            experiment_id: next_id.to_string(),
            name: name.to_string(),
            creation_time: Some(now_millis()),
        };
        let dir = self.experiment_dir(&experiment.experiment_id)?;
        self.create_dir(&dir).await?;
        self.write_json(&dir.join(META_FILE), &experiment).await?;
        Ok(experiment)
    }

    pub async fn create_run(&self, experiment_id: &str) -> Result<RunInfo, TrackingError> {
        let run = RunInfo {
            run_id: uuid::Uuid::new_v4().simple().to_string(),
            experiment_id: experiment_id.to_string(),
            start_time: now_millis(),
            end_time: None,
            status: RunStatus::Running,
        };
        let dir = self.run_dir(experiment_id, &run.run_id)?;
        for sub in ["params", "metrics", "artifacts"] {
            self.create_dir(&dir.join(sub)).await?;
        }
        self.write_json(&dir.join(META_FILE), &run).await?;
        Ok(run)
    }

    pub async fn log_param(&self, run: &RunInfo, key: &str, value: &str) -> Result<(), TrackingError> {
        let path = self
            .run_dir(&run.experiment_id, &run.run_id)?
            .join("params")
            .join(safe_component(key)?);
        fs::write(&path, value).await.map_err(|e| TrackingError::io(&path, e))
    }

    pub async fn log_metric(&self, run: &RunInfo, key: &str, value: f64) -> Result<(), TrackingError> {
        let path = self
            .run_dir(&run.experiment_id, &run.run_id)?
            .join("metrics")
            .join(safe_component(key)?);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TrackingError::io(&path, e))?;
        let line = format!("{} {} 0\n", now_millis(), value);
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| TrackingError::io(&path, e))
    }

    pub async fn log_artifact(&self, run: &RunInfo, path: &str, bytes: Vec<u8>) -> Result<(), TrackingError> {
        let full = self
            .run_dir(&run.experiment_id, &run.run_id)?
            .join("artifacts")
            .join(safe_relative(path)?);
        if let Some(parent) = full.parent() {
            self.create_dir(parent).await?;
        }
        fs::write(&full, bytes).await.map_err(|e| TrackingError::io(&full, e))
    }

    pub async fn end_run(&self, run: &RunInfo, status: RunStatus) -> Result<RunInfo, TrackingError> {
        let finished = RunInfo {
            end_time: Some(now_millis()),
            status,
            ..run.clone()
        };
        let path = self.run_dir(&run.experiment_id, &run.run_id)?.join(META_FILE);
        self.write_json(&path, &finished).await?;
        Ok(finished)
    }
}

/// MLflow tracking server client
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    client: Client,
}

/// MLflow encodes int64 fields either as JSON numbers or as strings
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("expected integer timestamp")),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("expected timestamp, got {}", other))),
    }
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64()),
        Some(Value::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!("expected timestamp, got {}", other))),
    }
}

#[derive(Debug, Deserialize)]
struct WireExperiment {
    experiment_id: String,
    name: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    creation_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExperimentEnvelope {
    experiment: WireExperiment,
}

#[derive(Debug, Deserialize)]
struct WireRunInfo {
    #[serde(alias = "run_uuid")]
    run_id: String,
    experiment_id: String,
    #[serde(deserialize_with = "lenient_i64")]
    start_time: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    end_time: Option<i64>,
    status: RunStatus,
}

impl From<WireRunInfo> for RunInfo {
    fn from(info: WireRunInfo) -> Self {
        RunInfo {
            run_id: info.run_id,
            experiment_id: info.experiment_id,
            start_time: info.start_time,
            end_time: info.end_time,
            status: info.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRun {
    info: WireRunInfo,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<WireRun>,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: WireRun,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

impl RestStore {
    pub fn new(base_url: &str) -> Result<Self, TrackingError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    async fn check(response: Response) -> Result<Response, TrackingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TrackingError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Response, TrackingError> {
        let url = self.api(endpoint);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&body).send().await?;
        Self::check(response).await
    }

    pub async fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, TrackingError> {
        let url = format!(
            "{}?experiment_name={}",
            self.api("experiments/get-by-name"),
            urlencoding::encode(name)
        );
        tracing::debug!("Fetching experiment from: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ExperimentEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| TrackingError::InvalidResponse(e.to_string()))?;

        Ok(Some(Experiment {
            experiment_id: envelope.experiment.experiment_id,
            name: envelope.experiment.name,
            creation_time: envelope.experiment.creation_time,
        }))
    }

    pub async fn search_latest_run(&self, experiment_id: &str) -> Result<Option<RunInfo>, TrackingError> {
        let body = json!({
            "experiment_ids": [experiment_id],
            "filter": "attributes.status = 'FINISHED'",
            "order_by": ["attributes.start_time DESC"],
            "max_results": 1,
        });
        let search: SearchRunsResponse = self
            .post("runs/search", body)
            .await?
            .json()
            .await
            .map_err(|e| TrackingError::InvalidResponse(e.to_string()))?;

        Ok(search.runs.into_iter().next().map(|run| run.info.into()))
    }

    pub async fn download_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>, TrackingError> {
        let url = format!(
            "{}/get-artifact?path={}&run_uuid={}",
            self.base_url,
            urlencoding::encode(path),
            urlencoding::encode(run_id)
        );
        tracing::debug!("Downloading artifact from: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TrackingError::ArtifactNotFound(format!("runs:/{}/{}", run_id, path)));
        }
        Ok(Self::check(response).await?.bytes().await?.to_vec())
    }

    pub async fn create_experiment(&self, name: &str) -> Result<Experiment, TrackingError> {
        let created: CreateExperimentResponse = self
            .post("experiments/create", json!({ "name": name }))
            .await?
            .json()
            .await
            .map_err(|e| TrackingError::InvalidResponse(e.to_string()))?;

        Ok(Experiment {
            experiment_id: created.experiment_id,
            name: name.to_string(),
            creation_time: Some(now_millis()),
        })
    }

    pub async fn create_run(&self, experiment_id: &str) -> Result<RunInfo, TrackingError> {
        let envelope: RunEnvelope = self
            .post(
                "runs/create",
                json!({ "experiment_id": experiment_id, "start_time": now_millis() }),
            )
            .await?
            .json()
            .await
            .map_err(|e| TrackingError::InvalidResponse(e.to_string()))?;

        Ok(envelope.run.info.into())
    }

    pub async fn log_param(&self, run: &RunInfo, key: &str, value: &str) -> Result<(), TrackingError> {
        self.post(
            "runs/log-parameter",
            json!({ "run_id": run.run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    pub async fn log_metric(&self, run: &RunInfo, key: &str, value: f64) -> Result<(), TrackingError> {
        self.post(
            "runs/log-metric",
            json!({
                "run_id": run.run_id,
                "key": key,
                "value": value,
                "timestamp": now_millis(),
                "step": 0,
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn log_artifact(&self, run: &RunInfo, path: &str, bytes: Vec<u8>) -> Result<(), TrackingError> {
        let relative = safe_relative(path)?;
        let encoded: Vec<String> = relative
            .components()
            .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
            .collect();
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}/artifacts/{}",
            self.base_url,
            urlencoding::encode(&run.experiment_id),
            urlencoding::encode(&run.run_id),
            encoded.join("/")
        );
        tracing::debug!("Uploading artifact to: {}", url);

        let response = self.client.put(&url).body(bytes).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn end_run(&self, run: &RunInfo, status: RunStatus) -> Result<RunInfo, TrackingError> {
        let end_time = now_millis();
        self.post(
            "runs/update",
            json!({ "run_id": run.run_id, "status": status.as_str(), "end_time": end_time }),
        )
        .await?;

        Ok(RunInfo {
            end_time: Some(end_time),
            status,
            ..run.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_from_uri() {
        assert!(matches!(
            TrackingStore::from_uri("file:///tmp/mlruns").unwrap(),
            TrackingStore::File(ref s) if s.root() == Path::new("/tmp/mlruns")
        ));
        assert!(matches!(
            TrackingStore::from_uri("./mlruns").unwrap(),
            TrackingStore::File(_)
        ));
        assert!(matches!(
            TrackingStore::from_uri("http://mlflow:5000/").unwrap(),
            TrackingStore::Rest(_)
        ));
        assert_eq!(
            TrackingStore::from_uri("http://mlflow:5000/").unwrap().uri(),
            "http://mlflow:5000"
        );
        assert!(TrackingStore::from_uri("s3://bucket/mlruns").is_err());
        assert!(TrackingStore::from_uri("file://").is_err());
    }

    #[test]
    fn test_path_guards() {
        assert!(safe_component("123").is_ok());
        assert!(safe_component("..").is_err());
        assert!(safe_component("a/b").is_err());
        assert!(safe_relative("model/model.json").is_ok());
        assert!(safe_relative("../escape").is_err());
        assert!(safe_relative("/abs").is_err());
    }

    #[tokio::test]
    async fn test_file_store_run_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrackingStore::File(FileStore::new(dir.path().join("mlruns")));

        assert!(store.get_experiment_by_name("exp").await.unwrap().is_none());

        let experiment = store.get_or_create_experiment("exp").await.unwrap();
        assert_eq!(experiment.experiment_id, "1");
        let again = store.get_or_create_experiment("exp").await.unwrap();
        assert_eq!(again.experiment_id, "1");

        assert!(store.search_latest_run("1").await.unwrap().is_none());

        let run = store.create_run("1").await.unwrap();
        store.log_param(&run, "n_estimators", "10").await.unwrap();
        store.log_metric(&run, "accuracy", 0.85).await.unwrap();
        store.log_artifact(&run, "model/model.json", b"{}".to_vec()).await.unwrap();

        // Running runs are not candidates
        assert!(store.search_latest_run("1").await.unwrap().is_none());

        store.end_run(&run, RunStatus::Finished).await.unwrap();
        let latest = store.search_latest_run("1").await.unwrap().unwrap();
        assert_eq!(latest.run_id, run.run_id);
        assert_eq!(latest.status, RunStatus::Finished);

        let bytes = store.download_artifact("1", &run.run_id, "model/model.json").await.unwrap();
        assert_eq!(bytes, b"{}");
        assert!(matches!(
            store.download_artifact("1", &run.run_id, "missing/model.json").await,
            Err(TrackingError::ArtifactNotFound(_))
        ));

        let params = std::fs::read_to_string(
            dir.path().join("mlruns/1").join(&run.run_id).join("params/n_estimators"),
        )
        .unwrap();
        assert_eq!(params, "10");
    }

    #[tokio::test]
    async fn test_file_store_corrupt_meta_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("1")).unwrap();
        std::fs::write(dir.path().join("1/meta.json"), "not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.get_experiment_by_name("exp").await,
            Err(TrackingError::Corrupt(_))
        ));
    }
}
