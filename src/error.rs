//! Error types for the transform/estimator pipeline and its artifacts

use thiserror::Error;

/// Errors raised by fitting, persisting and scoring the income pipeline.
///
/// Unseen categories and absent optional fields are not errors; they are
/// absorbed by imputation and never reach this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("pipeline is not fitted")]
    NotFitted,

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for errors caused by the caller's input rather than the process state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidRecord(_) | PipelineError::Schema(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
