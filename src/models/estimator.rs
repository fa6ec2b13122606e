//! Estimator stage: L2-regularised logistic regression.
//!
//! Training minimises `Σ logloss + ‖w‖² / (2C)` by cyclic coordinate descent.
//! Each coordinate step is a Newton step against the curvature bound of the
//! logistic loss (`σ'(z) ≤ 1/4`), so every step decreases the objective and no
//! line search is needed. The intercept is not penalised.

use crate::error::{PipelineError, Result};
use crate::features::DenseMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Maximum coordinate descent rounds
    pub max_iter: usize,
    /// Converged when the largest step in a round is below this
    pub tol: f64,
    /// Inverse regularisation strength
    pub c: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-4,
            c: 1.0,
        }
    }
}

/// Fitted coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticParams {
    #[inline]
    fn margin(&self, row: &[f64]) -> f64 {
        self.intercept + row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>()
    }
}

/// Outcome of a training run. Non-convergence is reported, not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    /// Regularised objective at the final coefficients
    pub objective: f64,
}

/// Logistic regression trainer
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: EstimatorConfig,
}

impl LogisticRegression {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Fit coefficients to `x` and binary labels `y`.
    pub fn fit(&self, x: &DenseMatrix, y: &[u8]) -> Result<(LogisticParams, FitReport)> {
        let n = x.num_rows();
        let d = x.num_cols();

        if y.len() != n {
            return Err(PipelineError::Dataset(format!(
                "{} rows but {} labels",
                n,
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&l| l > 1) {
            return Err(PipelineError::Dataset(format!("label {} is not 0 or 1", bad)));
        }
        let positives = y.iter().filter(|&&l| l == 1).count();
        if positives == 0 || positives == n {
            return Err(PipelineError::Dataset(
                "training labels must contain both classes".into(),
            ));
        }
        if !(self.config.c.is_finite() && self.config.c > 0.0) {
            return Err(PipelineError::Dataset(format!(
                "regularisation C must be positive, got {}",
                self.config.c
            )));
        }

        let lambda = 1.0 / self.config.c;
        let targets: Vec<f64> = y.iter().map(|&l| f64::from(l)).collect();

        // Column-wise sparse view; one-hot blocks are mostly zeros.
        let columns: Vec<Vec<(usize, f64)>> = (0..d).map(|j| x.column_nonzeros(j).collect()).collect();
        let curvature: Vec<f64> = columns
            .iter()
            .map(|col| 0.25 * col.iter().map(|(_, v)| v * v).sum::<f64>() + lambda)
            .collect();
        let intercept_curvature = 0.25 * n as f64;

        let base_rate = positives as f64 / n as f64;
        let mut params = LogisticParams {
            weights: vec![0.0; d],
            intercept: (base_rate / (1.0 - base_rate)).ln(),
        };
        let mut margins = vec![params.intercept; n];

        let mut converged = false;
        let mut iterations = 0;

        for round in 1..=self.config.max_iter {
            iterations = round;
            let mut max_step = 0.0f64;

            let grad: f64 = margins
                .iter()
                .zip(&targets)
                .map(|(&m, &t)| sigmoid(m) - t)
                .sum();
            let step = -grad / intercept_curvature;
            if step != 0.0 {
                params.intercept += step;
                margins.iter_mut().for_each(|m| *m += step);
                max_step = max_step.max(step.abs());
            }

            for (j, column) in columns.iter().enumerate() {
                if column.is_empty() {
                    continue;
                }
                let grad: f64 = column
                    .iter()
                    .map(|&(i, v)| (sigmoid(margins[i]) - targets[i]) * v)
                    .sum::<f64>()
                    + lambda * params.weights[j];
                let step = -grad / curvature[j];
                if step != 0.0 {
                    params.weights[j] += step;
                    for &(i, v) in column {
                        margins[i] += step * v;
                    }
                    max_step = max_step.max(step.abs());
                }
            }

            if round % 25 == 0 {
                debug!(
                    round,
                    max_step,
                    objective = objective(&margins, &targets, &params.weights, lambda),
                    "Coordinate descent progress"
                );
            }

            if max_step < self.config.tol {
                converged = true;
                break;
            }
        }

        let report = FitReport {
            iterations,
            converged,
            objective: objective(&margins, &targets, &params.weights, lambda),
        };

        if !converged {
            warn!(
                max_iter = self.config.max_iter,
                objective = report.objective,
                "Logistic regression did not converge within the iteration budget"
            );
        }

        Ok((params, report))
    }
}

/// Pure scoring: `(matrix, params) -> probabilities`.
pub fn predict_probability(x: &DenseMatrix, params: &LogisticParams) -> Result<Vec<f64>> {
    if x.num_cols() != params.weights.len() {
        return Err(PipelineError::Schema(format!(
            "feature width {} does not match {} fitted weights",
            x.num_cols(),
            params.weights.len()
        )));
    }
    Ok(x.rows().map(|row| sigmoid(params.margin(row))).collect())
}

/// Numerically stable logistic link
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z) without overflow
#[inline]
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn objective(margins: &[f64], targets: &[f64], weights: &[f64], lambda: f64) -> f64 {
    let loss: f64 = margins
        .iter()
        .zip(targets)
        .map(|(&m, &t)| if t > 0.5 { softplus(-m) } else { softplus(m) })
        .sum();
    loss + 0.5 * lambda * weights.iter().map(|w| w * w).sum::<f64>()
}
