use actix_cors::Cors;
use actix_web::middleware::{from_fn, Compress};
use actix_web::{web, App, HttpServer};
use clap::{Args, Parser, Subcommand};
use risk_predictor::config::Settings;
use risk_predictor::middleware::{request_logging, HealthCheckFilter};
use risk_predictor::routes::{self, AppState};
use risk_predictor::services::{
    DataSource, ModelCache, ModelLocator, PredictionService, Trainer, TrackingStore, TrainingParams,
};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Heart disease risk prediction service
#[derive(Debug, Parser)]
#[command(name = "risk-predictor", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the prediction API (default)
    Serve(ServeArgs),
    /// Train a model and log it to the tracking store
    Train(TrainArgs),
}

#[derive(Debug, Clone, Args)]
struct ServeArgs {
    /// Host to bind, overrides HOST
    host: Option<String>,
    /// Port to bind, overrides PORT
    port: Option<u16>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct TrainArgs {
    /// CSV file to train on instead of downloading the UCI dataset
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,
    #[arg(long, default_value_t = 42)]
    random_state: u64,
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(short, long)]
    log_level: Option<String>,
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::Other, format!("{}: {}", context, err))
}

fn load_settings(log_level: Option<String>) -> std::io::Result<Settings> {
    let mut settings = Settings::load().map_err(|e| startup_error("Configuration error", e))?;
    if let Some(level) = log_level {
        settings.logging.level = level;
    }

    risk_predictor::logging::init(&settings).map_err(|e| startup_error("Logging error", e))?;
    info!(event = "configuration_loaded", settings = %settings.debug_summary(), "Configuration loaded");
    Ok(settings)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Train(args)) => train(args).await,
        Some(Command::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
    }
}

async fn serve(args: ServeArgs) -> std::io::Result<()> {
    let mut settings = load_settings(args.log_level)?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    info!("Starting Risk Predictor API...");

    let store = TrackingStore::from_uri(&settings.tracking.uri)
        .map_err(|e| startup_error("Invalid tracking URI", e))?;
    let locator = ModelLocator::new(
        Arc::new(store),
        settings.tracking.experiment_name.clone(),
        settings.tracking.model_name.clone(),
    );
    let cache = Arc::new(ModelCache::new(locator));

    if settings.environment.loads_model_at_startup() {
        match cache.load().await {
            Some(loaded) => info!(model = ?loaded, "Model ready"),
            None => warn!("API started without a model; train one and call POST /reload-model"),
        }
    } else {
        info!(environment = %settings.environment, "Skipping model load at startup");
    }

    let predictor = Arc::new(PredictionService::new(cache, settings.environment.model_policy()));
    let state = AppState::new(predictor, settings.environment);
    let health_filter = web::Data::new(HealthCheckFilter::new(settings.logging.health_check_paths.clone()));

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.max(1);

    info!("Starting HTTP server on {}:{} with {} workers", host, port, workers);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(health_filter.clone())
            .app_data(routes::json_config())
            .wrap(Cors::permissive())
            .wrap(Compress::default())
            .wrap(from_fn(request_logging))
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

async fn train(args: TrainArgs) -> std::io::Result<()> {
    let settings = load_settings(args.log_level)?;

    let store = TrackingStore::from_uri(&settings.tracking.uri)
        .map_err(|e| startup_error("Invalid tracking URI", e))?;
    let trainer = Trainer::new(
        Arc::new(store),
        settings.tracking.experiment_name.clone(),
        settings.tracking.model_name.clone(),
    );

    let params = TrainingParams {
        n_estimators: args.n_estimators,
        test_size: args.test_size,
        random_state: args.random_state,
        max_depth: args.max_depth,
    };
    let source = args.data.map(DataSource::File).unwrap_or_default();

    match trainer.run(&params, &source).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                model_uri = %report.model_uri,
                n_train = report.n_train,
                n_test = report.n_test,
                "Model trained. Accuracy: {:.4}",
                report.accuracy
            );
            Ok(())
        }
        Err(e) => {
            error!(event = "training_failed", error_message = %e, "Training failed");
            Err(startup_error("Training failed", e))
        }
    }
}
