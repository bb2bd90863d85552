//! crm-leads - Lead records with asynchronous sentiment enrichment
//!
//! Serves the lead CRUD API and the `/leads/status` polling endpoint. Notes are
//! classified on a small background worker pool so requests never wait on the
//! sentiment model.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crm_common::config::{self, ClassifierBackend};
use crm_leads::services::{start_enrichment, ConfiguredModelLoader, SentimentClassifier};
use crm_leads::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for crm-leads
#[derive(Parser, Debug)]
#[command(name = "crm-leads")]
#[command(about = "Lead records with background sentiment enrichment")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CRM_PORT")]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long, env = "CRM_HOST")]
    host: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "CRM_DATABASE")]
    database: Option<PathBuf>,

    /// Number of enrichment workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Sentiment inference endpoint; selects the HTTP classifier backend
    #[arg(long, env = "CRM_CLASSIFIER_ENDPOINT")]
    classifier_endpoint: Option<String>,

    /// Bearer token for the inference endpoint
    #[arg(long, env = "CRM_CLASSIFIER_TOKEN", hide_env_values = true)]
    classifier_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing exists so the configured level can apply
    let config_path = config::resolve_config_path(args.config.as_deref());
    let mut settings = config::load_or_default(&config_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting crm-leads v{}", env!("CARGO_PKG_VERSION"));
    if config_path.exists() {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using defaults", config_path.display());
    }

    // CLI and environment override TOML
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(database) = args.database {
        settings.database_path = Some(database);
    }
    if let Some(workers) = args.workers {
        settings.enrichment.workers = workers;
    }
    if let Some(endpoint) = args.classifier_endpoint {
        settings.classifier.backend = ClassifierBackend::Http;
        settings.classifier.endpoint = Some(endpoint);
    }
    if let Some(token) = args.classifier_token {
        settings.classifier.api_token = Some(token);
    }
    settings.validate()?;

    let db_path = settings.database_path();
    info!("Database: {}", db_path.display());
    let pool = crm_common::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let classifier = Arc::new(SentimentClassifier::new(
        Arc::new(ConfiguredModelLoader::new(settings.classifier.clone())),
        settings.classifier.max_input_chars,
    ));
    info!(
        backend = ?settings.classifier.backend,
        model = %settings.classifier.model,
        "Sentiment classifier configured (loads on first use)"
    );

    let dispatcher = start_enrichment(pool.clone(), Arc::clone(&classifier), settings.enrichment.workers)
        .context("Failed to start enrichment workers")?;

    let state = AppState::new(pool, dispatcher, classifier);
    let app = build_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("crm-leads listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
