//! Held-out evaluation: ROC AUC and per-class classification report

use crate::models::estimator::FitReport;
use crate::types::label_for;
use serde::{Deserialize, Serialize};

/// Precision / recall / F1 for one class or one average
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: u64,
}

impl ClassMetrics {
    fn from_counts(tp: u64, fp: u64, fn_: u64) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1_score,
            support: tp + fn_,
        }
    }
}

/// Classification report keyed the way ops dashboards read it: `"0"`, `"1"`,
/// `"accuracy"`, `"macro avg"`, `"weighted avg"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(rename = "0")]
    pub negative: ClassMetrics,
    #[serde(rename = "1")]
    pub positive: ClassMetrics,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn compute(labels: &[u8], predicted: &[u8]) -> Self {
        debug_assert_eq!(labels.len(), predicted.len());

        let (mut tp, mut fp, mut tn, mut fn_) = (0u64, 0u64, 0u64, 0u64);
        for (&l, &p) in labels.iter().zip(predicted) {
            match (l, p) {
                (1, 1) => tp += 1,
                (0, 1) => fp += 1,
                (1, 0) => fn_ += 1,
                _ => tn += 1,
            }
        }

        let positive = ClassMetrics::from_counts(tp, fp, fn_);
        let negative = ClassMetrics::from_counts(tn, fn_, fp);
        let total = tp + fp + tn + fn_;

        let average = |wp: f64, wn: f64| ClassMetrics {
            precision: wp * positive.precision + wn * negative.precision,
            recall: wp * positive.recall + wn * negative.recall,
            f1_score: wp * positive.f1_score + wn * negative.f1_score,
            support: total,
        };
        let weight_pos = ratio(positive.support, total);
        let weight_neg = ratio(negative.support, total);

        Self {
            negative,
            positive,
            accuracy: ratio(tp + tn, total),
            macro_avg: average(0.5, 0.5),
            weighted_avg: average(weight_pos, weight_neg),
        }
    }
}

/// Metrics persisted next to every artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub roc_auc: f64,
    pub report: ClassificationReport,
    pub iterations: usize,
    pub converged: bool,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl TrainingMetrics {
    /// Evaluate held-out probabilities against their labels.
    pub fn evaluate(labels: &[u8], probabilities: &[f64], fit: &FitReport, train_rows: usize) -> Self {
        let predicted: Vec<u8> = probabilities.iter().map(|&p| label_for(p)).collect();
        Self {
            roc_auc: roc_auc(labels, probabilities),
            report: ClassificationReport::compute(labels, &predicted),
            iterations: fit.iterations,
            converged: fit.converged,
            train_rows,
            test_rows: labels.len(),
        }
    }
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney U) statistic, with
/// tied scores sharing their average rank. Returns 0.5 if a class is absent.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> f64 {
    debug_assert_eq!(labels.len(), scores.len());

    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based: positions i..=j share (i + j) / 2 + 1
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
