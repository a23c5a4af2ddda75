use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Experiment the training command logs to and the server loads from
pub const DEFAULT_EXPERIMENT_NAME: &str = "patient_risk_prediction";

/// Artifact name the model is logged under inside a run
pub const DEFAULT_MODEL_NAME: &str = "random_forest_model";

/// Plain (unprefixed) environment variables and the settings keys they override
const PLAIN_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("WORKERS", "server.workers"),
    ("ENVIRONMENT", "environment"),
    ("MLFLOW_TRACKING_URI", "tracking.uri"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
    ("LOG_DIR", "logging.dir"),
    ("LOG_TO_FILE", "logging.to_file"),
    ("LOG_FILE_MAX_BYTES", "logging.file_max_bytes"),
    ("LOG_FILE_BACKUP_COUNT", "logging.file_backup_count"),
    ("LOG_ERROR_FILE_MAX_BYTES", "logging.error_file_max_bytes"),
    ("LOG_ERROR_FILE_BACKUP_COUNT", "logging.error_file_backup_count"),
];

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    #[serde(default)]
    pub is_docker: bool,
    pub server: ServerSettings,
    pub tracking: TrackingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingSettings {
    pub uri: String,
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_experiment_name() -> String { DEFAULT_EXPERIMENT_NAME.to_string() }
fn default_model_name() -> String { DEFAULT_MODEL_NAME.to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: Option<LogFormat>,
    #[serde(default)]
    pub structured: bool,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    pub to_file: bool,
    #[serde(default = "default_file_max_bytes")]
    pub file_max_bytes: u64,
    #[serde(default = "default_file_backup_count")]
    pub file_backup_count: usize,
    #[serde(default = "default_error_file_max_bytes")]
    pub error_file_max_bytes: u64,
    #[serde(default = "default_error_file_backup_count")]
    pub error_file_backup_count: usize,
    #[serde(default = "default_health_check_paths")]
    pub health_check_paths: Vec<String>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_file_max_bytes() -> u64 { 10 * 1024 * 1024 }
fn default_file_backup_count() -> usize { 5 }
fn default_error_file_max_bytes() -> u64 { 5 * 1024 * 1024 }
fn default_error_file_backup_count() -> usize { 3 }

fn default_health_check_paths() -> Vec<String> {
    vec!["/".to_string(), "/health".to_string(), "/healthz".to_string()]
}

/// Output format of the console and file log layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[serde(alias = "compact", alias = "plain")]
    Text,
}

/// Deployment environment the process runs in.
///
/// Every environment-dependent decision in the service goes through this
/// type instead of comparing environment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Environment {
    Local,
    Docker,
    Test,
    Development,
    Production,
}

/// What the prediction path does when no model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPolicy {
    /// Try one synchronous reload before giving up
    AutoReload,
    /// Report the missing model straight away
    FailFast,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Docker => "docker",
            Environment::Test => "test",
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn model_policy(&self) -> ModelPolicy {
        match self {
            Environment::Docker | Environment::Production => ModelPolicy::FailFast,
            Environment::Local | Environment::Development | Environment::Test => {
                ModelPolicy::AutoReload
            }
        }
    }

    /// Tests start with an empty model cache and load explicitly
    pub fn loads_model_at_startup(&self) -> bool {
        !matches!(self, Environment::Test)
    }

    pub fn prefers_structured_logs(&self) -> bool {
        matches!(self, Environment::Docker | Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "docker" => Ok(Environment::Docker),
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment '{}', expected one of: local, docker, test, development, production",
                other
            )),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inputs used to decide whether the process runs inside a container
#[derive(Debug, Clone)]
pub struct ContainerProbe {
    pub dockerenv_exists: bool,
    pub docker_container_var: Option<String>,
    pub cwd: PathBuf,
    pub tracking_uri: Option<String>,
}

impl ContainerProbe {
    /// Collect the probe inputs from the running process
    pub fn from_process() -> Self {
        Self {
            dockerenv_exists: Path::new("/.dockerenv").exists(),
            docker_container_var: std::env::var("DOCKER_CONTAINER").ok(),
            cwd: std::env::current_dir().unwrap_or_default(),
            tracking_uri: std::env::var("MLFLOW_TRACKING_URI").ok(),
        }
    }

    /// `resolve_host` answers whether a host name resolves; it is only
    /// consulted when the tracking URI points at the compose service name.
    pub fn is_container<F>(&self, resolve_host: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        if self.dockerenv_exists {
            return true;
        }
        if self.docker_container_var.as_deref() == Some("true") {
            return true;
        }
        if self.cwd == Path::new("/app") {
            return true;
        }
        match self.tracking_uri.as_deref() {
            Some(uri) if uri.starts_with("http://mlflow:") => resolve_host("mlflow"),
            _ => false,
        }
    }
}

/// Detect a containerised process, resolving the `mlflow` host over DNS
pub fn is_running_in_docker() -> bool {
    ContainerProbe::from_process().is_container(|host| {
        (host, 5000)
            .to_socket_addrs()
            .map(|mut addrs| addrs.next().is_some())
            .unwrap_or(false)
    })
}

/// Load `config/docker.env` or `config/local.env` without overriding
/// variables that are already set. Returns the file that was read, if any.
pub fn load_env_file(is_docker: bool) -> Option<PathBuf> {
    let path = if is_docker {
        PathBuf::from("config/docker.env")
    } else {
        PathBuf::from("config/local.env")
    };

    dotenv::from_path(&path).ok().map(|_| path)
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Container-aware defaults
    /// 2. Configuration files (config/default, config/local)
    /// 3. Environment variables prefixed with RISK__ (RISK__SERVER__PORT -> server.port)
    /// 4. Plain deployment variables (HOST, PORT, MLFLOW_TRACKING_URI, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let is_docker = is_running_in_docker();
        load_env_file(is_docker);

        let cwd = std::env::current_dir().unwrap_or_default();
        let env: HashMap<String, String> = std::env::vars().collect();

        let builder = defaults(is_docker, &cwd)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        finish(builder, &env)
    }

    /// Resolve settings from an explicit environment map, without reading
    /// config files or the process environment
    pub fn from_env_map(
        is_docker: bool,
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        finish(defaults(is_docker, cwd)?, env)
    }

    pub fn log_format(&self) -> LogFormat {
        if let Some(format) = self.logging.format {
            return format;
        }
        if self.logging.structured || self.is_docker || self.environment.prefers_structured_logs() {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    /// Settings snapshot logged once at startup
    pub fn debug_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "environment_detected": if self.is_docker { "docker" } else { "local" },
            "environment": self.environment.as_str(),
            "mlflow_uri": self.tracking.uri,
            "api_host": self.server.host,
            "api_port": self.server.port,
            "workers": self.server.workers,
            "log_level": self.logging.level,
            "experiment_name": self.tracking.experiment_name,
            "model_name": self.tracking.model_name,
        })
    }
}

fn defaults(is_docker: bool, cwd: &Path) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let tracking_uri = if is_docker {
        "http://mlflow:5000".to_string()
    } else {
        format!("file://{}/mlruns", cwd.display())
    };

    Config::builder()
        .set_default("is_docker", is_docker)?
        .set_default("environment", if is_docker { "docker" } else { "local" })?
        .set_default("server.host", if is_docker { "0.0.0.0" } else { "127.0.0.1" })?
        .set_default("server.port", 8000)?
        .set_default("server.workers", if is_docker { 2 } else { 1 })?
        .set_default("tracking.uri", tracking_uri)?
        .set_default("logging.to_file", !is_docker)
}

fn finish(
    builder: ConfigBuilder<DefaultState>,
    env: &HashMap<String, String>,
) -> Result<Settings, ConfigError> {
    let prefixed: config::Map<String, String> = env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    // e.g., RISK__SERVER__PORT -> server.port
    let mut builder = builder.add_source(
        config::Environment::with_prefix("RISK")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(prefixed)),
    );

    for (var, key) in PLAIN_ENV_OVERRIDES {
        if let Some(value) = env.get(*var).filter(|v| !v.trim().is_empty()) {
            let value = if *key == "logging.format" {
                value.to_lowercase()
            } else {
                value.clone()
            };
            builder = builder.set_override(*key, value)?;
        }
    }

    if let Some(flag) = env.get("ENABLE_STRUCTURED_LOGGING") {
        builder = builder.set_override("logging.structured", flag.eq_ignore_ascii_case("true"))?;
    }

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_local_defaults() {
        let settings = Settings::from_env_map(false, Path::new("/home/dev/project"), &env(&[])).unwrap();

        assert_eq!(settings.environment, Environment::Local);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.workers, 1);
        assert_eq!(settings.tracking.uri, "file:///home/dev/project/mlruns");
        assert_eq!(settings.tracking.experiment_name, "patient_risk_prediction");
        assert_eq!(settings.tracking.model_name, "random_forest_model");
        assert!(settings.logging.to_file);
        assert_eq!(settings.log_format(), LogFormat::Text);
    }

    #[test]
    fn test_docker_defaults() {
        let settings = Settings::from_env_map(true, Path::new("/app"), &env(&[])).unwrap();

        assert_eq!(settings.environment, Environment::Docker);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.workers, 2);
        assert_eq!(settings.tracking.uri, "http://mlflow:5000");
        assert!(!settings.logging.to_file);
        assert_eq!(settings.log_format(), LogFormat::Json);
    }

    #[test]
    fn test_plain_env_overrides() {
        let settings = Settings::from_env_map(
            false,
            Path::new("/tmp"),
            &env(&[
                ("HOST", "0.0.0.0"),
                ("PORT", "9090"),
                ("WORKERS", "4"),
                ("ENVIRONMENT", "Production"),
                ("MLFLOW_TRACKING_URI", "http://tracking:5000"),
                ("LOG_LEVEL", "DEBUG"),
                ("LOG_FILE_BACKUP_COUNT", "7"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.workers, 4);
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.tracking.uri, "http://tracking:5000");
        assert_eq!(settings.logging.level, "DEBUG");
        assert_eq!(settings.logging.file_backup_count, 7);
    }

    #[test]
    fn test_prefixed_env_overrides() {
        let settings = Settings::from_env_map(
            false,
            Path::new("/tmp"),
            &env(&[("RISK__TRACKING__EXPERIMENT_NAME", "nightly")]),
        )
        .unwrap();

        assert_eq!(settings.tracking.experiment_name, "nightly");
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let result = Settings::from_env_map(false, Path::new("/tmp"), &env(&[("ENVIRONMENT", "staging")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_structured_logging_flag() {
        let settings = Settings::from_env_map(
            false,
            Path::new("/tmp"),
            &env(&[("ENABLE_STRUCTURED_LOGGING", "true")]),
        )
        .unwrap();
        assert_eq!(settings.log_format(), LogFormat::Json);

        let settings = Settings::from_env_map(
            true,
            Path::new("/app"),
            &env(&[("LOG_FORMAT", "PRETTY")]),
        )
        .unwrap();
        assert_eq!(settings.log_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_environment_policy() {
        assert_eq!(Environment::Production.model_policy(), ModelPolicy::FailFast);
        assert_eq!(Environment::Docker.model_policy(), ModelPolicy::FailFast);
        assert_eq!(Environment::Development.model_policy(), ModelPolicy::AutoReload);
        assert_eq!(Environment::Local.model_policy(), ModelPolicy::AutoReload);
        assert!(!Environment::Test.loads_model_at_startup());
        assert!(Environment::Production.loads_model_at_startup());
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
    }

    #[test]
    fn test_container_probe() {
        let probe = ContainerProbe {
            dockerenv_exists: false,
            docker_container_var: None,
            cwd: PathBuf::from("/home/user/project"),
            tracking_uri: None,
        };
        assert!(!probe.is_container(|_| true));

        let in_app_dir = ContainerProbe { cwd: PathBuf::from("/app"), ..probe.clone() };
        assert!(in_app_dir.is_container(|_| false));

        let flagged = ContainerProbe { docker_container_var: Some("true".into()), ..probe.clone() };
        assert!(flagged.is_container(|_| false));

        let compose = ContainerProbe {
            tracking_uri: Some("http://mlflow:5000".into()),
            ..probe.clone()
        };
        assert!(compose.is_container(|host| host == "mlflow"));
        assert!(!compose.is_container(|_| false));
    }
}
