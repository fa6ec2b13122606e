//! Income Predictor - Training Job
//!
//! Fits the transform + logistic pipeline on a labelled CSV, evaluates it on a
//! held-out split and writes a new immutable artifact version.

use anyhow::{Context, Result};
use clap::Parser;
use income_predictor::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    dataset::{Dataset, LABEL_COLUMN},
    logging, ArtifactStore, Pipeline, SchemaDescriptor, TrainingMetrics,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(version, about = "Train the income classifier and save an artifact", long_about = None)]
struct Args {
    /// Configuration file (TOML); missing file means built-in defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Training CSV (requires --test)
    #[arg(long, requires = "test", conflicts_with = "input")]
    train: Option<PathBuf>,

    /// Held-out CSV
    #[arg(long, requires = "train")]
    test: Option<PathBuf>,

    /// Single CSV to split with the configured stratified split
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Artifact store root (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_from_path(&args.config)?;
    logging::init(&config.logging)?;

    info!("Income Predictor training job v{}", env!("CARGO_PKG_VERSION"));

    let (train, test) = match (&args.train, &args.test, &args.input) {
        (Some(train), Some(test), _) => (
            Dataset::from_csv(train).context("Failed to load training set")?,
            Dataset::from_csv(test).context("Failed to load test set")?,
        ),
        (None, None, Some(input)) => {
            let all = Dataset::from_csv(input).context("Failed to load dataset")?;
            info!(
                rows = all.len(),
                test_fraction = config.training.test_fraction,
                seed = config.training.seed,
                "Splitting dataset"
            );
            all.stratified_split(config.training.test_fraction, config.training.seed)?
        }
        _ => anyhow::bail!("Provide either --train and --test, or --input"),
    };

    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        train_positive_rate = format!("{:.3}", train.positive_rate()),
        "Datasets ready"
    );

    let schema = match config.training.declared_schema()? {
        Some(schema) => schema,
        None => SchemaDescriptor::infer(&train.features, &[LABEL_COLUMN])?,
    };
    info!(numeric = ?schema.numeric(), categorical = ?schema.categorical(), "Schema");

    let estimator = config.training.estimator();
    info!(
        max_iter = estimator.max_iter,
        tol = estimator.tol,
        c = estimator.c,
        "Fitting pipeline"
    );

    let mut pipeline = Pipeline::new(schema.clone(), estimator);
    let fit = pipeline
        .fit(&train.features, &train.labels)
        .context("Training failed")?;

    let probabilities = pipeline
        .predict_probability(&test.features)
        .context("Failed to score held-out set")?;
    let metrics = TrainingMetrics::evaluate(&test.labels, &probabilities, &fit, train.len());

    info!(
        roc_auc = format!("{:.3}", metrics.roc_auc),
        accuracy = format!("{:.3}", metrics.report.accuracy),
        precision_pos = format!("{:.3}", metrics.report.positive.precision),
        recall_pos = format!("{:.3}", metrics.report.positive.recall),
        iterations = metrics.iterations,
        converged = metrics.converged,
        "Evaluation"
    );

    let root = args.output.unwrap_or(config.artifacts.root);
    let saved = ArtifactStore::new(&root)
        .save(&pipeline, &schema, &metrics)
        .context("Failed to save artifact")?;

    info!(
        version = %saved.version,
        path = %saved.path.display(),
        "Training completed successfully"
    );

    Ok(())
}
