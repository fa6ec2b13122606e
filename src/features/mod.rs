//! Feature transformation: the shared train/serve encoding of raw columns

pub mod matrix;
pub mod transform;

pub use matrix::DenseMatrix;
pub use transform::{transform, CategoryEncoder, ColumnTransformer, FittedTransform, NumericScaler};
