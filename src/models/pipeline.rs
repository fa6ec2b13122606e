//! Transform + estimator composition with a single fit/predict contract

use crate::error::{PipelineError, Result};
use crate::features::{ColumnTransformer, FittedTransform};
use crate::models::estimator::{self, EstimatorConfig, FitReport, LogisticParams, LogisticRegression};
use crate::schema::SchemaDescriptor;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything learned by a successful `fit`. This is the persisted pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub transform: FittedTransform,
    pub estimator: LogisticParams,
}

impl FittedPipeline {
    /// Internal consistency: valid transform state and one weight per output feature.
    pub fn validate(&self) -> Result<()> {
        self.transform.validate()?;
        if self.transform.output_width() != self.estimator.weights.len() {
            return Err(PipelineError::Schema(format!(
                "transform produces {} features but estimator has {} weights",
                self.transform.output_width(),
                self.estimator.weights.len()
            )));
        }
        if !self.estimator.intercept.is_finite()
            || self.estimator.weights.iter().any(|w| !w.is_finite())
        {
            return Err(PipelineError::Schema("estimator has non-finite coefficients".into()));
        }
        Ok(())
    }
}

/// Column transform stage followed by the logistic estimator.
///
/// Once fitted (or loaded) the pipeline is read-only; `predict_probability`
/// takes `&self` and may be called concurrently.
#[derive(Debug, Clone)]
pub struct Pipeline {
    transformer: ColumnTransformer,
    estimator: LogisticRegression,
    fitted: Option<FittedPipeline>,
}

impl Pipeline {
    pub fn new(schema: SchemaDescriptor, config: EstimatorConfig) -> Self {
        Self {
            transformer: ColumnTransformer::new(schema),
            estimator: LogisticRegression::new(config),
            fitted: None,
        }
    }

    /// Rebuild a fitted pipeline from persisted state.
    pub fn from_fitted(schema: SchemaDescriptor, fitted: FittedPipeline) -> Result<Self> {
        fitted.validate()?;
        fitted.transform.check_schema(&schema)?;
        Ok(Self {
            transformer: ColumnTransformer::new(schema),
            estimator: LogisticRegression::default(),
            fitted: Some(fitted),
        })
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        self.transformer.schema()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted(&self) -> Result<&FittedPipeline> {
        self.fitted.as_ref().ok_or(PipelineError::NotFitted)
    }

    /// Fit both stages on training rows. Replaces any previous fitted state.
    pub fn fit(&mut self, rows: &Table, labels: &[u8]) -> Result<FitReport> {
        let transform = self.transformer.fit(rows)?;
        let x = transform.transform(rows)?;
        let (params, report) = self.estimator.fit(&x, labels)?;

        info!(
            rows = rows.num_rows(),
            features = x.num_cols(),
            iterations = report.iterations,
            converged = report.converged,
            "Pipeline fitted"
        );

        self.fitted = Some(FittedPipeline {
            transform,
            estimator: params,
        });
        Ok(report)
    }

    /// Probability of the positive class per row, using the fitted state as-is.
    pub fn predict_probability(&self, rows: &Table) -> Result<Vec<f64>> {
        let fitted = self.fitted()?;
        let x = fitted.transform.transform(rows)?;
        estimator::predict_probability(&x, &fitted.estimator)
    }

    /// Output feature names of the fitted transform
    pub fn feature_names(&self) -> Result<Vec<String>> {
        Ok(self.fitted()?.transform.feature_names())
    }
}
