//! Tracing subscriber setup.
//!
//! Console output always goes to stdout. When file logging is enabled two
//! size-rotated files are written under the log directory: one with every
//! event and one with errors only.

use crate::config::{LogFormat, Settings};
use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const APP_NAME: &str = "risk-predictor";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Failed to open log file {path}: {source}")]
    LogFile { path: PathBuf, source: io::Error },

    #[error("Logging already initialised: {0}")]
    AlreadyInitialised(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Parse a `LOG_LEVEL` name.
///
/// Accepts tracing level names as well as `WARNING`, `CRITICAL` and `FATAL`,
/// case-insensitively. Unknown names fall back to INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    let level = level.trim().to_lowercase();
    let name = match level.as_str() {
        "warning" => "warn",
        "critical" | "fatal" => "error",
        other => other,
    };
    LevelFilter::from_str(name).unwrap_or(LevelFilter::INFO)
}

/// Filter from `RUST_LOG` directives when set, otherwise from the level name
pub fn build_filter(level: &str, directives: Option<&str>) -> Result<EnvFilter, LoggingError> {
    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|_| LoggingError::InvalidLevel(directives.to_string()))
        }
        None => Ok(EnvFilter::default().add_directive(parse_level(level).into())),
    }
}

/// Install the global subscriber described by `settings`
pub fn init(settings: &Settings) -> Result<(), LoggingError> {
    let directives = std::env::var("RUST_LOG").ok();
    let filter = build_filter(&settings.logging.level, directives.as_deref())?;

    let format = settings.log_format();
    let mut layers: Vec<BoxedLayer> = vec![format_layer(format, io::stdout)];

    if settings.logging.to_file {
        let dir = &settings.logging.dir;
        let all = RotatingFileWriter::open(
            dir.join(format!("{}.log", APP_NAME)),
            settings.logging.file_max_bytes,
            settings.logging.file_backup_count,
        )?;
        let errors = RotatingFileWriter::open(
            dir.join(format!("{}-errors.log", APP_NAME)),
            settings.logging.error_file_max_bytes,
            settings.logging.error_file_backup_count,
        )?;

        layers.push(format_layer(format, all));
        layers.push(
            format_layer(format, errors)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    tracing::info!(
        event = "logging_setup_complete",
        environment = %settings.environment,
        log_level = %settings.logging.level,
        json_format = format == LogFormat::Json,
        is_docker = settings.is_docker,
        file_logging_enabled = settings.logging.to_file,
        log_directory = %settings.logging.dir.display(),
        "Logging configured"
    );

    Ok(())
}

fn format_layer<W>(format: LogFormat, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_level(true);

    match format {
        LogFormat::Json => layer.json().with_current_span(true).with_span_list(false).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Text => layer.compact().boxed(),
    }
}

/// Append-only log file that rolls over once it would exceed `max_bytes`.
///
/// Rolled files are renamed `<name>.1` .. `<name>.<backup_count>`, the
/// highest index being the oldest. With `backup_count == 0` the file is
/// truncated instead.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: PathBuf, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backup_count,
            file,
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Shared handle handed to `tracing-subscriber` as a writer factory
#[derive(Debug, Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingFileWriter {
    pub fn open(path: PathBuf, max_bytes: u64, backup_count: usize) -> Result<Self, LoggingError> {
        let file = RotatingFile::open(path.clone(), max_bytes, backup_count)
            .map_err(|source| LoggingError::LogFile { path, source })?;

        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }
}

pub struct RotatingFileGuard<'a>(MutexGuard<'a, RotatingFile>);

impl Write for RotatingFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingFileGuard(self.inner.lock())
    }
}
