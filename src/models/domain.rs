use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk category derived from the classifier's output class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    High,
}

/// Scored prediction for one patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub risk: i64,
    pub risk_level: RiskLevel,
}

impl PredictionResult {
    /// `risk_level` is high exactly when the score is 1
    pub fn from_score(risk: i64) -> Self {
        let risk_level = if risk == 1 { RiskLevel::High } else { RiskLevel::Low };
        Self { risk, risk_level }
    }
}

/// Named group of training runs in the tracking store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    #[serde(default)]
    pub creation_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Scheduled,
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Scheduled => "SCHEDULED",
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

/// One execution of the training procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub experiment_id: String,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    pub status: RunStatus,
}

/// Pointer to a model artifact logged inside a run, rendered as
/// `runs:/<run_id>/<artifact_path>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    pub run_id: String,
    pub artifact_path: String,
    pub experiment_id: String,
    pub start_time: i64,
}

impl ModelReference {
    pub fn new(run: &RunInfo, artifact_path: impl Into<String>) -> Self {
        Self {
            run_id: run.run_id.clone(),
            artifact_path: artifact_path.into(),
            experiment_id: run.experiment_id.clone(),
            start_time: run.start_time,
        }
    }

    pub fn uri(&self) -> String {
        format!("runs:/{}/{}", self.run_id, self.artifact_path)
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runs:/{}/{}", self.run_id, self.artifact_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_follows_score() {
        assert_eq!(PredictionResult::from_score(1).risk_level, RiskLevel::High);
        assert_eq!(PredictionResult::from_score(0).risk_level, RiskLevel::Low);

        let json = serde_json::to_value(PredictionResult::from_score(1)).unwrap();
        assert_eq!(json, serde_json::json!({"risk": 1, "risk_level": "high"}));
    }

    #[test]
    fn test_model_reference_uri() {
        let run = RunInfo {
            run_id: "abc123".to_string(),
            experiment_id: "1".to_string(),
            start_time: 1_700_000_000_000,
            end_time: None,
            status: RunStatus::Finished,
        };
        let reference = ModelReference::new(&run, "random_forest_model");
        assert_eq!(reference.uri(), "runs:/abc123/random_forest_model");
        assert_eq!(reference.to_string(), reference.uri());
    }

    #[test]
    fn test_run_status_wire_format() {
        let status: RunStatus = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(status, RunStatus::Finished);
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), "\"FAILED\"");
    }
}
