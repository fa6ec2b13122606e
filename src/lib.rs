//! Income Predictor Library
//!
//! Trains a census income classifier and serves it from a single persisted
//! artifact. The column transform learned at training time is stored with the
//! estimator, so serving applies exactly the same scaling and encoding.

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod scoring;
pub mod server;
pub mod table;
pub mod types;

pub use artifact::{ArtifactStore, LoadedArtifact};
pub use config::AppConfig;
pub use dataset::Dataset;
pub use error::{PipelineError, Result};
pub use evaluation::TrainingMetrics;
pub use models::pipeline::Pipeline;
pub use schema::SchemaDescriptor;
pub use scoring::ScoringService;
pub use table::Table;
pub use types::{FeatureRecord, OneOrMany, Prediction, Value};
