//! Income Predictor - Scoring Server
//!
//! Loads one pipeline artifact at startup and serves `/predict` and `/health`
//! until interrupted. Refuses to start if the artifact does not load cleanly.

use anyhow::{Context, Result};
use clap::Parser;
use income_predictor::{
    artifact::ArtifactStore,
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    logging,
    metrics::{MetricsReporter, ScoringMetrics},
    server::{self, AppState},
    ScoringService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "income-server")]
#[command(version, about = "Serve income predictions from a trained artifact")]
struct Args {
    /// Configuration file (TOML); missing file means built-in defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Artifact version to serve (overrides config; latest when unset)
    #[arg(long)]
    version_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_from_path(&args.config)?;
    logging::init(&config.logging)?;

    info!("Starting Income Predictor scoring server");

    let store = ArtifactStore::new(&config.artifacts.root);
    let artifact = match args.version_id.as_ref().or(config.artifacts.version.as_ref()) {
        Some(version) => store.load(version),
        None => store.load_latest(),
    }
    .with_context(|| {
        format!(
            "Failed to load artifact from {}",
            config.artifacts.root.display()
        )
    })?;

    info!(
        version = %artifact.manifest.version,
        created_at = %artifact.manifest.created_at,
        roc_auc = artifact.metrics.roc_auc,
        numeric = ?artifact.schema.numeric(),
        categorical = ?artifact.schema.categorical(),
        "Model artifact loaded"
    );
    if !artifact.metrics.converged {
        warn!(
            iterations = artifact.metrics.iterations,
            "Serving a model whose training did not converge"
        );
    }

    let service = Arc::new(ScoringService::from_artifact(artifact)?);
    let metrics = Arc::new(ScoringMetrics::new());

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = server::router(AppState {
        service,
        metrics: metrics.clone(),
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
