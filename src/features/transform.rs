//! Column transform stage: numeric scaling and categorical indicator encoding.
//!
//! Fitting learns one scale factor per numeric column and one closed category
//! vocabulary per categorical column. Transforming is a pure function of the
//! schema, the fitted state and the input table, so training and serving
//! produce identical vectors for identical rows.
//!
//! Imputation policy applied by [`FittedTransform::transform`]:
//! - missing numeric values become `0.0` before scaling
//! - missing categorical values become [`UNKNOWN_CATEGORY`] before slotting
//! - a category outside the fit-time vocabulary encodes as all zeros

use crate::error::{PipelineError, Result};
use crate::features::matrix::DenseMatrix;
use crate::schema::SchemaDescriptor;
use crate::table::Table;
use crate::types::{Value, UNKNOWN_CATEGORY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Scale factor for one numeric column (uncentred standard deviation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub scale: f64,
}

impl NumericScaler {
    /// Learn the scale from a column. Missing cells are ignored; a constant or
    /// empty column gets scale 1.0.
    fn fit(column: &str, values: &[Value]) -> Result<Self> {
        // Welford
        let mut count = 0u64;
        let mut mean = 0.0f64;
        let mut m2 = 0.0f64;

        for (row, value) in values.iter().enumerate() {
            let Some(x) = numeric_cell(column, row, value)? else {
                continue;
            };
            count += 1;
            let delta = x - mean;
            mean += delta / count as f64;
            m2 += delta * (x - mean);
        }

        let std = if count > 0 {
            (m2 / count as f64).sqrt()
        } else {
            0.0
        };
        let scale = if std.is_finite() && std > 0.0 { std } else { 1.0 };

        Ok(Self {
            column: column.to_string(),
            scale,
        })
    }

    #[inline]
    fn apply(&self, value: f64) -> f64 {
        value / self.scale
    }
}

/// Closed category vocabulary for one categorical column.
///
/// Categories are kept sorted; a category's slot is its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoryEncoder {
    fn fit(column: &str, values: &[Value]) -> Self {
        let categories: BTreeSet<String> = values.iter().filter_map(Value::as_category).collect();
        Self {
            column: column.to_string(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Slot for a value, `None` when the category was never seen during fit.
    pub fn slot(&self, value: &Value) -> Option<usize> {
        let category = value
            .as_category()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        self.categories.binary_search(&category).ok()
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }
}

/// Learned transform state. Never mutated after fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    numeric: Vec<NumericScaler>,
    categorical: Vec<CategoryEncoder>,
}

impl FittedTransform {
    pub fn numeric(&self) -> &[NumericScaler] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[CategoryEncoder] {
        &self.categorical
    }

    /// Width of the transformed vector
    pub fn output_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(CategoryEncoder::width).sum::<usize>()
    }

    /// Names of the output features: `column` for numeric, `column=value` per slot
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|s| s.column.clone()).collect();
        for encoder in &self.categorical {
            for category in &encoder.categories {
                names.push(format!("{}={}", encoder.column, category));
            }
        }
        names
    }

    /// Ensure the schema names exactly the columns this state was fitted on,
    /// in the same order and with the same kinds.
    pub fn check_schema(&self, schema: &SchemaDescriptor) -> Result<()> {
        let numeric = self.numeric.iter().map(|s| s.column.as_str());
        let categorical = self.categorical.iter().map(|e| e.column.as_str());

        if !numeric.eq(schema.numeric().iter().map(String::as_str)) {
            return Err(PipelineError::Schema(format!(
                "numeric columns {:?} do not match fitted state {:?}",
                schema.numeric(),
                self.numeric.iter().map(|s| &s.column).collect::<Vec<_>>()
            )));
        }
        if !categorical.eq(schema.categorical().iter().map(String::as_str)) {
            return Err(PipelineError::Schema(format!(
                "categorical columns {:?} do not match fitted state {:?}",
                schema.categorical(),
                self.categorical.iter().map(|e| &e.column).collect::<Vec<_>>()
            )));
        }
        Ok(())
    }

    /// Structural checks for state that arrived from outside `fit` (e.g. disk).
    pub fn validate(&self) -> Result<()> {
        for scaler in &self.numeric {
            if !(scaler.scale.is_finite() && scaler.scale > 0.0) {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has invalid scale {}",
                    scaler.column, scaler.scale
                )));
            }
        }
        for encoder in &self.categorical {
            if encoder.categories.windows(2).any(|w| w[0] >= w[1]) {
                return Err(PipelineError::Schema(format!(
                    "column '{}' categories are not sorted and unique",
                    encoder.column
                )));
            }
        }
        Ok(())
    }

    /// Encode a table. Numeric block first, then categorical blocks in order.
    ///
    /// Columns absent from the table are treated as entirely missing. Fails
    /// only when a numeric cell holds non-numeric text.
    pub fn transform(&self, table: &Table) -> Result<DenseMatrix> {
        let rows = table.num_rows();
        let mut out = DenseMatrix::zeros(rows, self.output_width());

        for (col, scaler) in self.numeric.iter().enumerate() {
            let Some(values) = input_column(table, &scaler.column)? else {
                continue;
            };
            for (row, value) in values.iter().enumerate() {
                let x = numeric_cell(&scaler.column, row, value)?.unwrap_or(0.0);
                out.set(row, col, scaler.apply(x));
            }
        }

        let mut offset = self.numeric.len();
        for encoder in &self.categorical {
            let missing = Value::Text(UNKNOWN_CATEGORY.to_string());
            match input_column(table, &encoder.column)? {
                Some(values) => {
                    for (row, value) in values.iter().enumerate() {
                        if let Some(slot) = encoder.slot(value) {
                            out.set(row, offset + slot, 1.0);
                        }
                    }
                }
                None => {
                    if let Some(slot) = encoder.slot(&missing) {
                        for row in 0..rows {
                            out.set(row, offset + slot, 1.0);
                        }
                    }
                }
            }
            offset += encoder.width();
        }

        Ok(out)
    }
}

/// Fits the column transform stage for a schema.
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    schema: SchemaDescriptor,
}

impl ColumnTransformer {
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Learn scale factors and category vocabularies from training rows.
    pub fn fit(&self, table: &Table) -> Result<FittedTransform> {
        let numeric = self
            .schema
            .numeric()
            .iter()
            .map(|name| NumericScaler::fit(name, required_column(table, name)?))
            .collect::<Result<Vec<_>>>()?;

        let categorical = self
            .schema
            .categorical()
            .iter()
            .map(|name| Ok(CategoryEncoder::fit(name, required_column(table, name)?)))
            .collect::<Result<Vec<_>>>()?;

        let fitted = FittedTransform {
            numeric,
            categorical,
        };

        debug!(
            rows = table.num_rows(),
            numeric = fitted.numeric.len(),
            categorical = fitted.categorical.len(),
            width = fitted.output_width(),
            "Column transform fitted"
        );

        Ok(fitted)
    }
}

/// Pure transform: `(schema, fitted state, rows) -> matrix`.
pub fn transform(
    schema: &SchemaDescriptor,
    state: &FittedTransform,
    table: &Table,
) -> Result<DenseMatrix> {
    state.check_schema(schema)?;
    state.transform(table)
}

/// A column of the table being encoded, rejected if its length disagrees
/// with the table's row count.
fn input_column<'a>(table: &'a Table, name: &str) -> Result<Option<&'a [Value]>> {
    match table.column(name) {
        Some(values) if values.len() != table.num_rows() => Err(PipelineError::Schema(format!(
            "column '{}' has {} values for {} rows",
            name,
            values.len(),
            table.num_rows()
        ))),
        column => Ok(column),
    }
}

fn required_column<'a>(table: &'a Table, name: &str) -> Result<&'a [Value]> {
    table.column(name).ok_or_else(|| {
        PipelineError::Schema(format!("declared column '{}' missing from training data", name))
    })
}

fn numeric_cell(column: &str, row: usize, value: &Value) -> Result<Option<f64>> {
    value.as_number().map_err(|_| {
        PipelineError::Schema(format!(
            "numeric column '{}' has non-numeric value {:?} at row {}",
            column, value, row
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_table() -> Table {
        let mut table = Table::new(4);
        table.insert_column("age", vec![20.0.into(), 30.0.into(), 40.0.into(), 50.0.into()]);
        table.insert_column("hours", vec![40.0.into(), 40.0.into(), 40.0.into(), Value::Missing]);
        table.insert_column(
            "sex",
            vec!["Male".into(), "Female".into(), Value::Missing, "Male".into()],
        );
        table
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec!["age".into(), "hours".into()], vec!["sex".into()]).unwrap()
    }

    #[test]
    fn test_fit_scales_without_centering() {
        let fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();

        // population std of 20,30,40,50
        let expected = 125.0f64.sqrt();
        assert!((fitted.numeric()[0].scale - expected).abs() < 1e-12);
        // constant column
        assert_eq!(fitted.numeric()[1].scale, 1.0);
        assert_eq!(fitted.categorical()[0].categories, vec!["Female", "Male"]);
        assert_eq!(fitted.output_width(), 4);
        assert_eq!(fitted.feature_names()[3], "sex=Male");
    }

    #[test]
    fn test_transform_layout_and_imputation() {
        let fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();
        let matrix = fitted.transform(&training_table()).unwrap();
        let scale = fitted.numeric()[0].scale;

        assert_eq!(matrix.row(0), &[20.0 / scale, 40.0, 0.0, 1.0]);
        assert_eq!(matrix.row(1), &[30.0 / scale, 40.0, 1.0, 0.0]);
        // missing category -> Unknown -> unseen -> zeros
        assert_eq!(matrix.row(2), &[40.0 / scale, 40.0, 0.0, 0.0]);
        // missing numeric -> 0
        assert_eq!(matrix.row(3), &[50.0 / scale, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_matches_missing() {
        let fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();

        let mut unseen = Table::new(1);
        unseen.insert_column("age", vec![33.0.into()]);
        unseen.insert_column("hours", vec![20.0.into()]);
        unseen.insert_column("sex", vec!["Martian".into()]);

        let mut absent = Table::new(1);
        absent.insert_column("age", vec![33.0.into()]);
        absent.insert_column("hours", vec![20.0.into()]);

        assert_eq!(fitted.transform(&unseen).unwrap(), fitted.transform(&absent).unwrap());
    }

    #[test]
    fn test_unknown_in_vocabulary_receives_missing() {
        let mut table = training_table();
        table.insert_column(
            "sex",
            vec!["Male".into(), UNKNOWN_CATEGORY.into(), "Female".into(), "Male".into()],
        );
        let fitted = ColumnTransformer::new(schema()).fit(&table).unwrap();

        let mut probe = Table::new(1);
        probe.insert_column("sex", vec![Value::Missing]);
        let matrix = fitted.transform(&probe).unwrap();

        // categories: Female, Male, Unknown
        assert_eq!(matrix.row(0), &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fit_rejects_text_in_numeric_column() {
        let mut table = training_table();
        table.insert_column("age", vec![20.0.into(), "old".into(), 40.0.into(), 50.0.into()]);

        let err = ColumnTransformer::new(schema()).fit(&table).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_transform_rejects_column_longer_than_table() {
        let fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();

        let mut ragged = Table::new(1);
        ragged.insert_column("age", vec![30.0.into(), 31.0.into()]);
        ragged.insert_column("sex", vec!["Male".into()]);

        assert!(matches!(fitted.transform(&ragged), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_fit_rejects_missing_declared_column() {
        let mut table = training_table();
        table.remove_column("sex");

        let err = ColumnTransformer::new(schema()).fit(&table).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_pure_transform_checks_schema() {
        let fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();
        let other = SchemaDescriptor::new(vec!["age".into()], vec!["sex".into()]).unwrap();

        assert!(transform(&schema(), &fitted, &training_table()).is_ok());
        assert!(matches!(
            transform(&other, &fitted, &training_table()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unsorted_vocabulary() {
        let mut fitted = ColumnTransformer::new(schema()).fit(&training_table()).unwrap();
        fitted.categorical[0].categories.reverse();
        assert!(fitted.validate().is_err());
    }
}
