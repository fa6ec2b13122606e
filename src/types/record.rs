//! Feature record data structures for census income scoring

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token substituted for missing categorical values.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Marker for a text value found where a number was required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotNumeric;

/// A single cell value, as it arrives from CSV or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Wrap a raw CSV cell. Empty cells are missing; everything else stays
    /// text until a numeric column asks for it through [`Value::as_number`],
    /// so categorical codes such as `"01"` keep their exact spelling.
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            Value::Missing
        } else {
            Value::Text(cell.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of the value: `Ok(None)` when missing, `Err(NotNumeric)`
    /// when the value is text that does not parse as a number.
    pub fn as_number(&self) -> Result<Option<f64>, NotNumeric> {
        match self {
            Value::Missing => Ok(None),
            Value::Number(n) => Ok(Some(*n)),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(NotNumeric),
            },
        }
    }

    /// Categorical view of the value. Numbers are rendered as text so that
    /// `3` and `"3"` land in the same slot.
    pub fn as_category(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// One entity's attributes submitted for prediction.
///
/// Kept as an open mapping so that records of any shape can be coerced to the
/// loaded schema; keys outside the schema are ignored at scoring time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord(BTreeMap<String, Value>);

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
