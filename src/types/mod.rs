//! Type definitions for the income scoring pipeline

pub mod prediction;
pub mod record;

pub use prediction::{label_for, OneOrMany, Prediction, DECISION_THRESHOLD};
pub use record::{FeatureRecord, Value, UNKNOWN_CATEGORY};
