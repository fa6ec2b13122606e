//! Estimator and pipeline composition

pub mod estimator;
pub mod pipeline;

pub use estimator::{EstimatorConfig, FitReport, LogisticParams, LogisticRegression};
pub use pipeline::{FittedPipeline, Pipeline};
