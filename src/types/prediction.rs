//! Prediction results and request/response shapes

use serde::{Deserialize, Serialize};

/// Probability at or above which a record is labelled positive (inclusive).
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Scored outcome for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability of the positive class (income over threshold)
    #[serde(rename = "probability_over_threshold")]
    pub probability: f64,
    /// Thresholded label, 1 iff `probability >= DECISION_THRESHOLD`
    #[serde(rename = "prediction")]
    pub label: u8,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            label: label_for(probability),
        }
    }
}

/// Apply the decision threshold
pub fn label_for(probability: f64) -> u8 {
    u8::from(probability >= DECISION_THRESHOLD)
}

/// A single item or an ordered batch. The response mirrors the request shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}
