//! Schema descriptor: which columns are numeric and which are categorical

use crate::error::{PipelineError, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Census numeric features, in transform order
pub const CENSUS_NUMERIC: [&str; 4] = ["age", "capital_gain", "capital_loss", "hours_per_week"];

/// Census categorical features, in transform order
pub const CENSUS_CATEGORICAL: [&str; 8] = [
    "workclass",
    "education",
    "marital_status",
    "occupation",
    "relationship",
    "race",
    "sex",
    "native_country",
];

/// Two disjoint, ordered column lists. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    numeric: Vec<String>,
    categorical: Vec<String>,
}

impl SchemaDescriptor {
    /// Build a schema, rejecting duplicate or overlapping column names.
    pub fn new(numeric: Vec<String>, categorical: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in numeric.iter().chain(&categorical) {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::Schema(format!(
                    "column '{}' declared more than once",
                    name
                )));
            }
        }
        if seen.is_empty() {
            return Err(PipelineError::Schema("schema declares no columns".into()));
        }
        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// The census income feature set
    pub fn census() -> Self {
        Self {
            numeric: CENSUS_NUMERIC.iter().map(|s| s.to_string()).collect(),
            categorical: CENSUS_CATEGORICAL.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Infer a schema from a table: a column is categorical if any non-missing
    /// cell is non-numeric, numeric otherwise. Columns in `exclude` are skipped.
    pub fn infer(table: &Table, exclude: &[&str]) -> Result<Self> {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for name in table.column_names() {
            if exclude.contains(&name.as_str()) {
                continue;
            }
            let column = table.column(name).unwrap_or_default();
            if column.iter().any(|v| v.as_number().is_err()) {
                categorical.push(name.clone());
            } else {
                numeric.push(name.clone());
            }
        }

        Self::new(numeric, categorical)
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    /// All columns: numeric block first, then categorical
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.numeric
            .iter()
            .chain(&self.categorical)
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric.iter().any(|c| c == name)
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical.iter().any(|c| c == name)
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::census()
    }
}
